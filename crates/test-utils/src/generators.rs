//! Synthetic grid data generators for testing.
//!
//! Fields are smooth analytic surfaces so contouring and binning produce
//! stable, predictable output.

use chrono::{DateTime, Utc};
use forecast_common::{BoundingBox, ForecastResult, Grid2D};

/// `count` evenly spaced coordinates starting at `start`. A negative `step`
/// gives a descending (north-to-south) axis.
pub fn axis(start: f64, step: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| start + i as f64 * step).collect()
}

/// Latitude/longitude axes covering `bbox` at `step` degrees, latitudes
/// north to south as forecast files store them.
pub fn axes_for(bbox: &BoundingBox, step: f64) -> (Vec<f64>, Vec<f64>) {
    let rows = (bbox.height() / step).round() as usize + 1;
    let cols = (bbox.width() / step).round() as usize + 1;
    (axis(bbox.max_y, -step, rows), axis(bbox.min_x, step, cols))
}

/// Evaluate `f(lon, lat)` at every cell, row-major.
pub fn field_on(lats: &[f64], lons: &[f64], f: impl Fn(f64, f64) -> f32) -> Vec<f32> {
    let mut values = Vec::with_capacity(lats.len() * lons.len());
    for &lat in lats {
        for &lon in lons {
            values.push(f(lon, lat));
        }
    }
    values
}

/// A `Grid2D` over `bbox` filled by `f(lon, lat)`.
pub fn grid_over(
    bbox: &BoundingBox,
    step: f64,
    valid_time: DateTime<Utc>,
    f: impl Fn(f64, f64) -> f32,
) -> ForecastResult<Grid2D> {
    let (lats, lons) = axes_for(bbox, step);
    let values = field_on(&lats, &lons, f);
    Grid2D::new(valid_time, lats, lons, values)
}

/// A 2 m temperature surface in °C: warm south, cold north, with a ripple
/// along longitude.
pub fn surface_temperature_celsius(lon: f64, lat: f64) -> f32 {
    let ripple = 4.0 * (lon.to_radians() * 6.0).sin();
    (30.0 - 0.9 * (lat - 30.0) + ripple) as f32
}

/// Simple gradient grid, row-major.
///
/// `value = col + row * width`, so every cell is distinct.
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    (0..height)
        .flat_map(|row| (0..width).map(move |col| (col + row * width) as f32))
        .collect()
}

/// A grid with a single circular bump of height `peak` centred on the grid.
pub fn create_bump_grid(width: usize, height: usize, peak: f32) -> Vec<f32> {
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let radius = cx.min(cy).max(1.0);
    (0..height)
        .flat_map(|row| {
            (0..width).map(move |col| {
                let d = ((col as f32 - cx).powi(2) + (row as f32 - cy).powi(2)).sqrt();
                (peak * (1.0 - d / radius)).max(0.0)
            })
        })
        .collect()
}

pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Zeros with NaN at the given (col, row) positions.
pub fn create_grid_with_nans(
    width: usize,
    height: usize,
    nan_positions: &[(usize, usize)],
) -> Vec<f32> {
    let mut data = vec![0.0f32; width * height];
    for &(col, row) in nan_positions {
        if col < width && row < height {
            data[row * width + col] = f32::NAN;
        }
    }
    data
}

/// RGBA gradient pattern with many distinct colors (forces truecolor PNG).
pub fn create_test_rgba_pixels(width: usize, height: usize) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        for x in 0..width {
            let r = ((x as f32 / width as f32) * 255.0) as u8;
            let g = ((y as f32 / height as f32) * 255.0) as u8;
            pixels.extend_from_slice(&[r, g, 128, 255]);
        }
    }
    pixels
}

/// RGBA pixels cycling through `palette` in horizontal bands (forces an
/// indexed PNG when the palette is small).
pub fn create_palette_pixels(width: usize, height: usize, palette: &[[u8; 4]]) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width * height * 4);
    if palette.is_empty() {
        return pixels;
    }
    for y in 0..height {
        let color = palette[y * palette.len() / height.max(1)];
        for _ in 0..width {
            pixels.extend_from_slice(&color);
        }
    }
    pixels
}
