//! Error types for forecast data handling.

use thiserror::Error;

/// Result type alias using ForecastError.
pub type ForecastResult<T> = Result<T, ForecastError>;

/// Primary error type for dataset access and task payload construction.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Variable not found in dataset: {0}")]
    MissingVariable(String),

    #[error("Pressure level {level} hPa not available for '{variable}'")]
    MissingLevel { variable: String, level: f64 },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Lead index {lead} out of range (dataset has {available} steps)")]
    LeadOutOfRange { lead: usize, available: usize },

    #[error("Domain lies outside the grid: {0}")]
    OutsideGrid(String),

    #[error("Failed to read data: {0}")]
    DataRead(String),

    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ForecastError {
    /// True when the error only says that an input variable is absent.
    pub fn is_missing_variable(&self) -> bool {
        matches!(self, ForecastError::MissingVariable(_))
    }
}
