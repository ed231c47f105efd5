//! Pipeline error taxonomy.
//!
//! Every variant except `Config` is isolated to one model, one variable or
//! one task; only a configuration error aborts a run.

use std::path::PathBuf;

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Download failed for {url}: {message}")]
    DownloadFailure { url: String, message: String },

    #[error("Failed to open dataset {path}: {message}")]
    DatasetOpenFailure { path: PathBuf, message: String },

    #[error("Source variable(s) not in dataset: {0}")]
    MissingVariable(String),

    #[error("Render failed for {filename}: {message}")]
    RenderFailure { filename: String, message: String },

    #[error("Cleanup failed for {path}: {message}")]
    CleanupFailure { path: PathBuf, message: String },
}

impl PipelineError {
    /// Short tag for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "config",
            PipelineError::DownloadFailure { .. } => "download_failed",
            PipelineError::DatasetOpenFailure { .. } => "open_failed",
            PipelineError::MissingVariable(_) => "missing_variable",
            PipelineError::RenderFailure { .. } => "render_failed",
            PipelineError::CleanupFailure { .. } => "cleanup_failed",
        }
    }
}
