//! Result Aggregator: drains a batch's completion stream.

use std::time::{Duration, Instant};

use metrics::counter;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::pool::ResultStream;

/// One failed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTask {
    pub filename: String,
    pub message: String,
}

/// Tally of one model's batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub model: String,
    pub submitted: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: Vec<FailedTask>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl RunSummary {
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Every submitted task reported back.
    pub fn is_complete(&self) -> bool {
        self.total == self.submitted
    }
}

/// Consume every result of `stream`. Returns only once all workers are done.
pub async fn drain(model: &str, mut stream: ResultStream) -> RunSummary {
    let started = Instant::now();
    let submitted = stream.submitted();
    let mut total = 0;
    let mut succeeded = 0;
    let mut failed = Vec::new();

    while let Some(result) = stream.next().await {
        total += 1;
        match result.message() {
            None => {
                succeeded += 1;
                counter!(
                    "maps_rendered_total",
                    "model" => model.to_string(),
                    "outcome" => "success"
                )
                .increment(1);
                debug!(model = %model, filename = %result.filename, "Map rendered");
            }
            Some(message) => {
                counter!(
                    "maps_rendered_total",
                    "model" => model.to_string(),
                    "outcome" => "failure"
                )
                .increment(1);
                error!(
                    model = %model,
                    filename = %result.filename,
                    error = %message,
                    "Map render failed"
                );
                failed.push(FailedTask {
                    filename: result.filename.clone(),
                    message: message.to_string(),
                });
            }
        }

        if total % 50 == 0 {
            debug!(
                model = %model,
                progress = format!("{}/{}", total, submitted),
                "Render progress"
            );
        }
    }

    if total != submitted {
        warn!(model = %model, submitted = submitted, received = total, "Result count mismatch");
    }

    let summary = RunSummary {
        model: model.to_string(),
        submitted,
        total,
        succeeded,
        failed,
        duration: started.elapsed(),
    };

    info!(
        model = %model,
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed_count(),
        duration_ms = summary.duration.as_millis() as u64,
        "Batch complete"
    );

    summary
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use forecast_common::{RenderTask, TaskResult};
    use test_utils::sample_render_task;

    use crate::pool::WorkerPool;
    use crate::render::Renderer;

    struct FailOdd;

    impl Renderer for FailOdd {
        fn render(&self, task: &RenderTask) -> TaskResult {
            if task.filename.ends_with("1.png") || task.filename.ends_with("3.png") {
                TaskResult::failure(&task.filename, "odd")
            } else {
                TaskResult::success(&task.filename)
            }
        }
    }

    #[tokio::test]
    async fn test_counts_every_result() {
        let template = sample_render_task("x.png").unwrap();
        let tasks: Vec<RenderTask> = (0..10)
            .map(|i| RenderTask {
                filename: format!("map{}.png", i),
                ..template.clone()
            })
            .collect();

        let pool = WorkerPool::new(4, Arc::new(FailOdd));
        let summary = drain("TEST", pool.submit(tasks)).await;

        assert!(summary.is_complete());
        assert_eq!(summary.total, 10);
        assert_eq!(summary.succeeded, 8);
        assert_eq!(summary.failed_count(), 2);
        assert!(summary.failed.iter().all(|f| f.message == "odd"));
    }

    #[test]
    fn test_summary_serializes() {
        let summary = RunSummary {
            model: "FOUR".to_string(),
            submitted: 1,
            total: 1,
            succeeded: 1,
            failed: Vec::new(),
            duration: Duration::from_millis(1500),
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["duration"], 1.5);
        assert_eq!(json["succeeded"], 1);
    }
}
