//! Render tasks and their results.

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::grid::Grid2D;

/// Secondary field drawn as labelled contour lines over the fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourOverlay {
    pub grid: Grid2D,
    pub levels: Vec<f64>,
}

/// One map to draw.
///
/// A task owns every value the renderer needs; it holds no handle to the
/// dataset it was cut from and no shared state, so it can be moved to any
/// worker (or serialized to another process) as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderTask {
    /// Model short name, e.g. "FOUR".
    pub model: String,
    /// Variable spec key the task was built from.
    pub variable: String,
    /// Filled field, already transformed and level-selected.
    pub field: Grid2D,
    pub contours: Option<ContourOverlay>,
    pub title: String,
    pub subtitle: String,
    pub valid_time: String,
    pub lead_label: String,
    pub filename: String,
    pub unit: String,
    pub colormap: String,
    pub fill_levels: Vec<f64>,
    pub extent: BoundingBox,
}

impl RenderTask {
    /// Second title line: variable, lead and valid time.
    pub fn caption(&self) -> String {
        format!(
            "{} ({}) - Valid: {} (Local)",
            self.subtitle, self.lead_label, self.valid_time
        )
    }
}

/// Outcome of one render task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Success,
    Failure { message: String },
}

/// Result reported by a worker for exactly one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub filename: String,
    pub outcome: TaskOutcome,
}

impl TaskResult {
    pub fn success(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            outcome: TaskOutcome::Success,
        }
    }

    pub fn failure(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            outcome: TaskOutcome::Failure {
                message: message.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Success)
    }

    /// Diagnostic message for failures.
    pub fn message(&self) -> Option<&str> {
        match &self.outcome {
            TaskOutcome::Success => None,
            TaskOutcome::Failure { message } => Some(message),
        }
    }
}
