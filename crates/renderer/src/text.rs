//! TrueType text for titles and captions.

use std::path::Path;

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use rusttype::{Font, Scale};

use crate::error::{RenderError, RenderResult};

/// Load a TrueType font from disk.
pub fn load_font(path: &Path) -> RenderResult<Font<'static>> {
    let bytes = std::fs::read(path)
        .map_err(|e| RenderError::Font(format!("{}: {}", path.display(), e)))?;
    Font::try_from_vec(bytes)
        .ok_or_else(|| RenderError::Font(format!("{}: not a usable TrueType font", path.display())))
}

/// Draw `text` horizontally centered on `center_x`, top edge at `y`.
pub fn draw_centered(
    image: &mut RgbaImage,
    font: &Font<'_>,
    text: &str,
    center_x: i32,
    y: i32,
    size: f32,
    color: [u8; 4],
) {
    let scale = Scale::uniform(size);
    let (width, _) = text_size(scale, font, text);
    draw_text_mut(image, Rgba(color), center_x - width / 2, y, scale, font, text);
}

/// Draw `text` with its left edge at `x`, top edge at `y`.
pub fn draw_left(
    image: &mut RgbaImage,
    font: &Font<'_>,
    text: &str,
    x: i32,
    y: i32,
    size: f32,
    color: [u8; 4],
) {
    draw_text_mut(image, Rgba(color), x, y, Scale::uniform(size), font, text);
}
