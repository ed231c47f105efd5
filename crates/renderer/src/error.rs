//! Error types for map rendering.

use thiserror::Error;

/// Result type for rendering operations.
pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Error, Debug)]
pub enum RenderError {
    /// Grid too small or inconsistent to draw
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    /// Fill or contour levels empty, non-finite or not increasing
    #[error("Invalid levels: {0}")]
    InvalidLevels(String),

    #[error("Unknown colormap: {0}")]
    UnknownColormap(String),

    /// Canvas allocation or compositing failed
    #[error("Canvas error: {0}")]
    Canvas(String),

    #[error("PNG encoding failed: {0}")]
    Encode(String),

    #[error("Font error: {0}")]
    Font(String),

    /// GeoJSON overlay could not be read or parsed
    #[error("Overlay error: {0}")]
    Overlay(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
