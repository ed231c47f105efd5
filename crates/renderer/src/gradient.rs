//! Level-binned fill rendering for gridded weather data.
//!
//! Values are assigned to the bins delimited by a sorted level array, with
//! one extra bin below the first level and one above the last (matplotlib's
//! `extend="both"`). `L` levels therefore need `L + 1` colors.

use rayon::prelude::*;

use crate::error::{RenderError, RenderResult};

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn transparent() -> Self {
        Self { r: 0, g: 0, b: 0, a: 0 }
    }
}

/// Linear color interpolation
pub fn interpolate_color(color1: Color, color2: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let t_inv = 1.0 - t;

    Color::new(
        ((color1.r as f32 * t_inv) + (color2.r as f32 * t)).round() as u8,
        ((color1.g as f32 * t_inv) + (color2.g as f32 * t)).round() as u8,
        ((color1.b as f32 * t_inv) + (color2.b as f32 * t)).round() as u8,
        ((color1.a as f32 * t_inv) + (color2.a as f32 * t)).round() as u8,
    )
}

/// Check that levels are non-empty, finite and strictly increasing.
pub fn validate_levels(levels: &[f64]) -> RenderResult<()> {
    if levels.is_empty() {
        return Err(RenderError::InvalidLevels("no levels".to_string()));
    }
    if let Some(bad) = levels.iter().find(|l| !l.is_finite()) {
        return Err(RenderError::InvalidLevels(format!("non-finite level {}", bad)));
    }
    if let Some(pair) = levels.windows(2).find(|w| w[1] <= w[0]) {
        return Err(RenderError::InvalidLevels(format!(
            "levels must increase ({} then {})",
            pair[0], pair[1]
        )));
    }
    Ok(())
}

/// Bin of `value` among `levels`: 0 below the first level, `levels.len()`
/// at or above the last. `None` for NaN.
pub fn bin_index(levels: &[f64], value: f32) -> Option<usize> {
    if value.is_nan() {
        return None;
    }
    let v = value as f64;
    Some(levels.partition_point(|&l| l <= v))
}

/// Render a level-binned fill.
///
/// `sample(x, y)` returns the field value under pixel `(x, y)` or `None`
/// where there is no data (left transparent). Rows are filled in parallel.
///
/// # Returns
/// RGBA pixel data (4 bytes per pixel)
pub fn render_level_fill<F>(
    width: usize,
    height: usize,
    levels: &[f64],
    colors: &[Color],
    sample: F,
) -> RenderResult<Vec<u8>>
where
    F: Fn(usize, usize) -> Option<f32> + Sync,
{
    validate_levels(levels)?;
    if colors.len() != levels.len() + 1 {
        return Err(RenderError::InvalidLevels(format!(
            "{} levels need {} colors, got {}",
            levels.len(),
            levels.len() + 1,
            colors.len()
        )));
    }

    let mut pixels = vec![0u8; width * height * 4];
    if width == 0 {
        return Ok(pixels);
    }

    pixels
        .par_chunks_mut(width * 4)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..width {
                let color = sample(x, y)
                    .and_then(|v| bin_index(levels, v))
                    .map(|bin| colors[bin])
                    .unwrap_or_else(Color::transparent);
                let i = x * 4;
                row[i] = color.r;
                row[i + 1] = color.g;
                row[i + 2] = color.b;
                row[i + 3] = color.a;
            }
        });

    Ok(pixels)
}
