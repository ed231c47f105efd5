//! Full map composition for one render task.
//!
//! Layout, top to bottom: title band, Mercator plot area (fill, contour
//! lines, graticule, overlays, frame), colorbar. Titles are drawn only when a
//! font is available; they are always stored as PNG text metadata.

use std::path::{Path, PathBuf};

use forecast_common::{Grid2D, RenderTask};
use rusttype::Font;
use tiny_skia::{
    FillRule, IntSize, Mask, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke, Transform,
};
use tracing::debug;

use crate::colormap::Colormap;
use crate::contour::{self, ContourStyle};
use crate::error::{RenderError, RenderResult};
use crate::gradient::{self, Color};
use crate::overlay::OverlayLayer;
use crate::png;
use crate::projection::{MercatorView, PlotRect};
use crate::text;

/// Canvas and decoration settings.
#[derive(Debug, Clone)]
pub struct MapStyle {
    pub width: u32,
    pub height: u32,
    pub background: [u8; 4],
    /// Color for cells with no data
    pub missing: [u8; 4],
    pub graticule: bool,
    pub graticule_color: [u8; 4],
    pub contour: ContourStyle,
    pub title_size: f32,
    pub caption_size: f32,
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 900,
            background: [255, 255, 255, 255],
            missing: [220, 220, 220, 255],
            graticule: true,
            graticule_color: [90, 90, 90, 110],
            contour: ContourStyle::default(),
            title_size: 24.0,
            caption_size: 17.0,
        }
    }
}

const SIDE_MARGIN: f32 = 48.0;
const TITLE_BAND: f32 = 78.0;
const BARE_TOP: f32 = 20.0;
const COLORBAR_BAND: f32 = 96.0;
const COLORBAR_HEIGHT: f32 = 18.0;
const TICK_FONT: f32 = 9.0;

/// Renders [`RenderTask`]s to PNG bytes.
///
/// Holds only immutable state, so one instance can be shared by every worker.
pub struct MapRenderer {
    style: MapStyle,
    overlays: Vec<OverlayLayer>,
    font: Option<Font<'static>>,
}

impl MapRenderer {
    pub fn new(style: MapStyle) -> Self {
        Self {
            style,
            overlays: Vec::new(),
            font: None,
        }
    }

    pub fn with_overlay(mut self, layer: OverlayLayer) -> Self {
        self.overlays.push(layer);
        self
    }

    pub fn with_font(mut self, font: Font<'static>) -> Self {
        self.font = Some(font);
        self
    }

    /// Load the title font from a file.
    pub fn with_font_file(self, path: &Path) -> RenderResult<Self> {
        Ok(self.with_font(text::load_font(path)?))
    }

    pub fn style(&self) -> &MapStyle {
        &self.style
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw the task and encode it as PNG.
    pub fn render_png(&self, task: &RenderTask) -> RenderResult<Vec<u8>> {
        let (pixmap, plot) = self.compose(task)?;
        let (width, height) = (pixmap.width(), pixmap.height());
        let mut rgba = demultiply(&pixmap);

        if let Some(font) = &self.font {
            let mut image = image::RgbaImage::from_raw(width, height, rgba)
                .ok_or_else(|| RenderError::Canvas("pixel buffer size mismatch".to_string()))?;
            self.draw_titles(&mut image, font, task, &plot);
            rgba = image.into_raw();
        }

        let caption = task.caption();
        png::encode_png(
            &rgba,
            width as usize,
            height as usize,
            &[
                ("Title", task.title.as_str()),
                ("Description", caption.as_str()),
                ("Software", "forecast-maps"),
            ],
        )
    }

    /// Draw the task and write it to `dir/<task.filename>`.
    pub fn render_to_dir(&self, task: &RenderTask, dir: &Path) -> RenderResult<PathBuf> {
        let bytes = self.render_png(task)?;
        let path = dir.join(&task.filename);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Everything except TrueType text.
    pub fn render_pixmap(&self, task: &RenderTask) -> RenderResult<Pixmap> {
        Ok(self.compose(task)?.0)
    }

    fn compose(&self, task: &RenderTask) -> RenderResult<(Pixmap, PlotRect)> {
        check_grid(&task.field, "fill")?;
        gradient::validate_levels(&task.fill_levels)?;
        let colormap = Colormap::by_name(&task.colormap)?;
        let colors = colormap.bin_colors(task.fill_levels.len());
        task.extent
            .validate()
            .map_err(|e| RenderError::InvalidGrid(format!("extent: {}", e)))?;

        let mut pixmap = Pixmap::new(self.style.width, self.style.height).ok_or_else(|| {
            RenderError::Canvas(format!(
                "cannot allocate {}x{} canvas",
                self.style.width, self.style.height
            ))
        })?;
        let [r, g, b, a] = self.style.background;
        pixmap.fill(tiny_skia::Color::from_rgba8(r, g, b, a));

        let top = if self.font.is_some() { TITLE_BAND } else { BARE_TOP };
        let available = PlotRect::new(
            SIDE_MARGIN,
            top,
            self.style.width as f32 - 2.0 * SIDE_MARGIN,
            self.style.height as f32 - top - COLORBAR_BAND,
        );
        if available.width < 2.0 || available.height < 2.0 {
            return Err(RenderError::Canvas("canvas too small for the plot area".to_string()));
        }
        let view = MercatorView::fit(task.extent, available);
        let clip = plot_mask(&pixmap, &view.rect)?;

        self.draw_fill(&mut pixmap, &view, &task.field, &task.fill_levels, &colors)?;

        if let Some(overlay) = &task.contours {
            check_grid(&overlay.grid, "contour")?;
            gradient::validate_levels(&overlay.levels)?;
            self.draw_contour_lines(&mut pixmap, &view, &overlay.grid, &overlay.levels, &clip);
        }

        if self.style.graticule {
            self.draw_graticule(&mut pixmap, &view, &clip);
        }
        for layer in &self.overlays {
            layer.draw(&mut pixmap, &view, Some(&clip));
        }
        draw_frame(&mut pixmap, &view.rect);
        draw_colorbar(&mut pixmap, &view.rect, &task.fill_levels, &colors);

        debug!(filename = %task.filename, "Composed map canvas");
        Ok((pixmap, view.rect))
    }

    fn draw_fill(
        &self,
        pixmap: &mut Pixmap,
        view: &MercatorView,
        field: &Grid2D,
        levels: &[f64],
        colors: &[Color],
    ) -> RenderResult<()> {
        let rect = view.rect;
        let (w, h) = (rect.width as usize, rect.height as usize);
        let [mr, mg, mb, ma] = self.style.missing;
        let missing = Color::new(mr, mg, mb, ma);

        let mut rgba = gradient::render_level_fill(w, h, levels, colors, |x, y| {
            let (lon, lat) = view.unproject(rect.x + x as f32 + 0.5, rect.y + y as f32 + 0.5);
            field.sample(lon, lat)
        })?;
        for px in rgba.chunks_exact_mut(4).filter(|px| px[3] == 0) {
            px.copy_from_slice(&[missing.r, missing.g, missing.b, missing.a]);
        }

        let size = IntSize::from_wh(w as u32, h as u32)
            .ok_or_else(|| RenderError::Canvas("empty plot area".to_string()))?;
        let layer = Pixmap::from_vec(rgba, size)
            .ok_or_else(|| RenderError::Canvas("fill layer size mismatch".to_string()))?;
        pixmap.draw_pixmap(
            rect.x as i32,
            rect.y as i32,
            layer.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        Ok(())
    }

    fn draw_contour_lines(
        &self,
        pixmap: &mut Pixmap,
        view: &MercatorView,
        grid: &Grid2D,
        levels: &[f64],
        clip: &Mask,
    ) {
        let traced = contour::trace_contours(
            &grid.values,
            grid.width(),
            grid.height(),
            levels,
            self.style.contour.smoothing_passes,
        );

        // Grid index space to canvas pixels
        let projected: Vec<contour::Contour> = traced
            .into_iter()
            .map(|c| contour::Contour {
                points: c
                    .points
                    .iter()
                    .filter_map(|p| grid.coordinates_at(p.x as f64, p.y as f64))
                    .map(|(lon, lat)| {
                        let (x, y) = view.project(lon, lat);
                        contour::Point::new(x, y)
                    })
                    .collect(),
                ..c
            })
            .collect();

        contour::stroke_contours(pixmap, &projected, &self.style.contour, Some(clip));
    }

    fn draw_graticule(&self, pixmap: &mut Pixmap, view: &MercatorView, clip: &Mask) {
        let bbox = view.bbox;
        let step = graticule_step(bbox.width().max(bbox.height()));

        let mut paint = Paint::default();
        let [r, g, b, a] = self.style.graticule_color;
        paint.set_color_rgba8(r, g, b, a);
        paint.anti_alias = true;
        let stroke = Stroke {
            width: 0.8,
            dash: tiny_skia::StrokeDash::new(vec![4.0, 4.0], 0.0),
            ..Stroke::default()
        };

        let rect = view.rect;
        for lon in multiples(bbox.min_x, bbox.max_x, step) {
            let (x, _) = view.project(lon, bbox.min_y);
            stroke_line(pixmap, (x, rect.y), (x, rect.bottom()), &paint, &stroke, Some(clip));
            contour::draw_text_label(
                pixmap,
                x,
                rect.bottom() + TICK_FONT,
                0.0,
                &degrees_label(wrap_longitude(lon)),
                TICK_FONT,
                [40, 40, 40, 255],
                false,
            );
        }
        for lat in multiples(bbox.min_y, bbox.max_y, step) {
            let (_, y) = view.project(bbox.min_x, lat);
            stroke_line(pixmap, (rect.x, y), (rect.right(), y), &paint, &stroke, Some(clip));
            let label = degrees_label(lat);
            let half = contour::segment_text_width(&label, TICK_FONT) / 2.0;
            contour::draw_text_label(
                pixmap,
                rect.x - half - 6.0,
                y,
                0.0,
                &label,
                TICK_FONT,
                [40, 40, 40, 255],
                false,
            );
        }
    }

    fn draw_titles(
        &self,
        image: &mut image::RgbaImage,
        font: &Font<'_>,
        task: &RenderTask,
        plot: &PlotRect,
    ) {
        let center = (image.width() / 2) as i32;
        let black = [0, 0, 0, 255];
        text::draw_centered(image, font, &task.title, center, 12, self.style.title_size, black);
        text::draw_centered(
            image,
            font,
            &task.caption(),
            center,
            12 + self.style.title_size as i32 + 10,
            self.style.caption_size,
            black,
        );

        // Unit to the right of the colorbar
        let (bar_left, bar_width, bar_top) = colorbar_geometry(image.width() as f32, plot);
        text::draw_left(
            image,
            font,
            &task.unit,
            (bar_left + bar_width + 10.0) as i32,
            bar_top as i32,
            self.style.caption_size,
            black,
        );
    }
}

fn check_grid(grid: &Grid2D, what: &str) -> RenderResult<()> {
    if grid.width() < 2 || grid.height() < 2 {
        return Err(RenderError::InvalidGrid(format!(
            "{} grid is {}x{}, need at least 2x2",
            what,
            grid.width(),
            grid.height()
        )));
    }
    if grid.values.len() != grid.width() * grid.height() {
        return Err(RenderError::InvalidGrid(format!(
            "{} grid has {} values for {}x{}",
            what,
            grid.values.len(),
            grid.width(),
            grid.height()
        )));
    }
    Ok(())
}

fn plot_mask(pixmap: &Pixmap, rect: &PlotRect) -> RenderResult<Mask> {
    let mut mask = Mask::new(pixmap.width(), pixmap.height())
        .ok_or_else(|| RenderError::Canvas("cannot allocate clip mask".to_string()))?;
    let area = Rect::from_xywh(rect.x, rect.y, rect.width, rect.height)
        .ok_or_else(|| RenderError::Canvas("degenerate plot rectangle".to_string()))?;
    mask.fill_path(
        &PathBuilder::from_rect(area),
        FillRule::Winding,
        false,
        Transform::identity(),
    );
    Ok(mask)
}

fn stroke_line(
    pixmap: &mut Pixmap,
    from: (f32, f32),
    to: (f32, f32),
    paint: &Paint,
    stroke: &Stroke,
    clip: Option<&Mask>,
) {
    let mut pb = PathBuilder::new();
    pb.move_to(from.0, from.1);
    pb.line_to(to.0, to.1);
    if let Some(path) = pb.finish() {
        pixmap.stroke_path(&path, paint, stroke, Transform::identity(), clip);
    }
}

fn draw_frame(pixmap: &mut Pixmap, rect: &PlotRect) {
    let Some(area) = Rect::from_xywh(rect.x, rect.y, rect.width, rect.height) else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color_rgba8(0, 0, 0, 255);
    let stroke = Stroke {
        width: 1.2,
        ..Stroke::default()
    };
    pixmap.stroke_path(
        &PathBuilder::from_rect(area),
        &paint,
        &stroke,
        Transform::identity(),
        None,
    );
}

/// Left edge, width and top edge of the colorbar.
fn colorbar_geometry(canvas_width: f32, plot: &PlotRect) -> (f32, f32, f32) {
    (canvas_width * 0.1, canvas_width * 0.8, plot.bottom() + 30.0)
}

/// Horizontal colorbar under the plot with triangular ends for the
/// out-of-range bins.
fn draw_colorbar(pixmap: &mut Pixmap, plot: &PlotRect, levels: &[f64], colors: &[Color]) {
    let (bar_left, bar_width, bar_top) = colorbar_geometry(pixmap.width() as f32, plot);
    let arrow = COLORBAR_HEIGHT;

    let interior = levels.len().saturating_sub(1);
    let inner_left = bar_left + arrow;
    let inner_width = bar_width - 2.0 * arrow;
    let cell = if interior > 0 {
        inner_width / interior as f32
    } else {
        inner_width
    };

    let mut paint = Paint::default();
    paint.anti_alias = false;

    // Interior bins 1..=interior
    for i in 0..interior.max(1) {
        let color = colors[(i + 1).min(colors.len() - 1)];
        paint.set_color_rgba8(color.r, color.g, color.b, color.a);
        let left = inner_left + i as f32 * cell;
        if let Some(r) = Rect::from_xywh(left, bar_top, cell + 0.5, COLORBAR_HEIGHT) {
            pixmap.fill_rect(r, &paint, Transform::identity(), None);
        }
    }

    let mut outline = PathBuilder::new();
    outline.move_to(bar_left, bar_top + COLORBAR_HEIGHT / 2.0);
    outline.line_to(inner_left, bar_top);
    outline.line_to(inner_left + inner_width, bar_top);
    outline.line_to(bar_left + bar_width, bar_top + COLORBAR_HEIGHT / 2.0);
    outline.line_to(inner_left + inner_width, bar_top + COLORBAR_HEIGHT);
    outline.line_to(inner_left, bar_top + COLORBAR_HEIGHT);
    outline.close();

    // Extension triangles
    paint.anti_alias = true;
    let under = colors[0];
    let over = colors[colors.len() - 1];
    let ends = [
        (under, bar_left, inner_left),
        (over, bar_left + bar_width, inner_left + inner_width),
    ];
    for (color, tip, base) in ends {
        paint.set_color_rgba8(color.r, color.g, color.b, color.a);
        let mut pb = PathBuilder::new();
        pb.move_to(tip, bar_top + COLORBAR_HEIGHT / 2.0);
        pb.line_to(base, bar_top);
        pb.line_to(base, bar_top + COLORBAR_HEIGHT);
        pb.close();
        if let Some(path) = pb.finish() {
            pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        }
    }

    paint.set_color_rgba8(0, 0, 0, 255);
    if let Some(path) = outline.finish() {
        let stroke = Stroke {
            width: 1.0,
            ..Stroke::default()
        };
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    // Tick labels, thinned so they do not collide
    let stride = tick_stride(levels.len(), inner_width);
    let integral = levels.iter().all(|l| (l - l.round()).abs() < 1e-9);
    for (i, level) in levels.iter().enumerate().step_by(stride) {
        let x = inner_left + i as f32 * cell;
        let label = if integral {
            format!("{:.0}", level)
        } else {
            format!("{:.1}", level)
        };
        stroke_line(
            pixmap,
            (x, bar_top + COLORBAR_HEIGHT),
            (x, bar_top + COLORBAR_HEIGHT + 4.0),
            &paint,
            &Stroke::default(),
            None,
        );
        contour::draw_text_label(
            pixmap,
            x,
            bar_top + COLORBAR_HEIGHT + 6.0 + TICK_FONT,
            0.0,
            &label,
            TICK_FONT,
            [0, 0, 0, 255],
            false,
        );
    }
}

/// Every `n`th level gets a label so that at most ~one label per 48 px fits.
fn tick_stride(level_count: usize, width: f32) -> usize {
    let max_labels = ((width / 48.0).floor() as usize).max(2);
    level_count.div_ceil(max_labels).max(1)
}

/// Graticule spacing for a box spanning `span` degrees.
pub fn graticule_step(span: f64) -> f64 {
    const STEPS: [f64; 7] = [1.0, 2.0, 5.0, 10.0, 15.0, 20.0, 30.0];
    STEPS
        .iter()
        .copied()
        .find(|step| span / step <= 8.0)
        .unwrap_or(30.0)
}

fn multiples(start: f64, end: f64, step: f64) -> impl Iterator<Item = f64> {
    let first = (start / step).ceil() as i64;
    let last = (end / step).floor() as i64;
    (first..=last).map(move |k| k as f64 * step)
}

fn wrap_longitude(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 {
        180.0
    } else {
        wrapped
    }
}

fn degrees_label(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

/// Straight RGBA bytes from a premultiplied pixmap.
fn demultiply(pixmap: &Pixmap) -> Vec<u8> {
    pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect()
}
