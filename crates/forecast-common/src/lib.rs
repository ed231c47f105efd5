//! Common types shared by the forecast map workspace.
//!
//! Everything a render task needs travels in the types defined here, so the
//! reader, the pipeline and the renderer agree on one data model.

pub mod bbox;
pub mod dataset;
pub mod error;
pub mod grid;
pub mod levels;
pub mod task;
pub mod time;
pub mod variable;

pub use bbox::{BoundingBox, DomainSpec};
pub use dataset::{ForecastDataset, MemoryDataset};
pub use error::{ForecastError, ForecastResult};
pub use grid::{Grid2D, GridSeries};
pub use levels::{DomainLevels, FillLevelTable, LevelRange};
pub use task::{ContourOverlay, RenderTask, TaskOutcome, TaskResult};
pub use time::{reference_date, valid_time_label, validate_time_format, LeadSpec};
pub use variable::{Component, Extraction, UnitTransform, VariableSpec};
