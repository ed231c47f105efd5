//! Forecast map generation pipeline.
//!
//! For each configured model: fetch the run's source file, open it, build
//! one self-contained render task per (variable, lead, domain), render the
//! batch on a fixed worker pool, tally the results and remove the source
//! file. Modules are exposed for the binary and for integration tests.

pub mod aggregate;
pub mod config;
pub mod download;
pub mod error;
pub mod orchestrator;
pub mod pool;
pub mod render;
pub mod source;
pub mod tasks;

pub use aggregate::{drain, FailedTask, RunSummary};
pub use config::MapConfig;
pub use download::{DownloadConfig, HttpFetcher, SourceFetcher};
pub use error::{PipelineError, PipelineResult};
pub use orchestrator::{
    DatasetOpener, ModelOutcome, ModelReport, NetCdfOpener, Orchestrator, RunReport,
    SourceFileGuard,
};
pub use pool::{ResultStream, WorkerPool};
pub use render::{PngRenderer, Renderer};
pub use source::SourceFile;
pub use tasks::TaskBuilder;
