//! Mercator placement of a lon/lat box inside a pixel rectangle.

use forecast_common::BoundingBox;

/// Latitude limit for the Mercator ordinate.
const MAX_LATITUDE: f64 = 85.05;

/// Pixel rectangle on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PlotRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

fn mercator_y(lat: f64) -> f64 {
    let phi = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    (std::f64::consts::FRAC_PI_4 + phi / 2.0).tan().ln()
}

fn inverse_mercator_y(y: f64) -> f64 {
    (2.0 * y.exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees()
}

/// A bounding box projected with Mercator and fitted into a pixel rectangle
/// with its aspect ratio preserved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MercatorView {
    pub bbox: BoundingBox,
    pub rect: PlotRect,
    y_top: f64,
    y_bottom: f64,
}

impl MercatorView {
    /// Largest rectangle with the box's projected aspect ratio that fits
    /// inside `available`, centered in it.
    pub fn fit(bbox: BoundingBox, available: PlotRect) -> Self {
        let y_top = mercator_y(bbox.max_y);
        let y_bottom = mercator_y(bbox.min_y);
        let projected_width = bbox.width().to_radians();
        let projected_height = (y_top - y_bottom).max(f64::EPSILON);
        let aspect = (projected_width / projected_height) as f32;

        let (width, height) = if available.width / available.height > aspect {
            (available.height * aspect, available.height)
        } else {
            (available.width, available.width / aspect)
        };

        let rect = PlotRect::new(
            (available.x + (available.width - width) / 2.0).round(),
            (available.y + (available.height - height) / 2.0).round(),
            width.round().max(1.0),
            height.round().max(1.0),
        );

        Self {
            bbox,
            rect,
            y_top,
            y_bottom,
        }
    }

    /// Canvas pixel position of a geographic point.
    pub fn project(&self, lon: f64, lat: f64) -> (f32, f32) {
        let fx = (lon - self.bbox.min_x) / self.bbox.width();
        let fy = (self.y_top - mercator_y(lat)) / (self.y_top - self.y_bottom);
        (
            self.rect.x + (fx as f32) * self.rect.width,
            self.rect.y + (fy as f32) * self.rect.height,
        )
    }

    /// Geographic point under a canvas pixel position.
    pub fn unproject(&self, px: f32, py: f32) -> (f64, f64) {
        let fx = ((px - self.rect.x) / self.rect.width) as f64;
        let fy = ((py - self.rect.y) / self.rect.height) as f64;
        let lon = self.bbox.min_x + fx * self.bbox.width();
        let lat = inverse_mercator_y(self.y_top - fy * (self.y_top - self.y_bottom));
        (lon, lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> MercatorView {
        MercatorView::fit(
            BoundingBox::from_extent([26.0, 32.0, 39.0, 42.5]),
            PlotRect::new(0.0, 0.0, 800.0, 600.0),
        )
    }

    #[test]
    fn test_corners_map_to_rect() {
        let v = view();
        let (x0, y0) = v.project(26.0, 42.5);
        let (x1, y1) = v.project(32.0, 39.0);
        assert!((x0 - v.rect.x).abs() < 1e-3);
        assert!((y0 - v.rect.y).abs() < 1e-3);
        assert!((x1 - v.rect.right()).abs() < 1e-3);
        assert!((y1 - v.rect.bottom()).abs() < 1e-3);
    }

    #[test]
    fn test_unproject_inverts_project() {
        let v = view();
        let (px, py) = v.project(29.0, 41.0);
        let (lon, lat) = v.unproject(px, py);
        assert!((lon - 29.0).abs() < 1e-3);
        assert!((lat - 41.0).abs() < 1e-3);
    }

    #[test]
    fn test_fit_preserves_aspect() {
        let v = MercatorView::fit(
            BoundingBox::from_extent([-20.0, 60.0, 25.0, 65.0]),
            PlotRect::new(10.0, 10.0, 1000.0, 1000.0),
        );
        // A wide box is limited by the available width.
        assert_eq!(v.rect.width, 1000.0);
        assert!(v.rect.height < 1000.0);
        assert!(v.rect.y > 10.0);
    }

    #[test]
    fn test_mercator_stretches_north() {
        let v = MercatorView::fit(
            BoundingBox::from_extent([0.0, 10.0, 0.0, 60.0]),
            PlotRect::new(0.0, 0.0, 500.0, 500.0),
        );
        let (_, y30) = v.project(5.0, 30.0);
        // 30N sits below the vertical midpoint because high latitudes stretch.
        assert!(y30 > v.rect.y + v.rect.height / 2.0);
    }
}
