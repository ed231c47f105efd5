//! Run Orchestrator: one model at a time, download, open, build, render,
//! aggregate, clean up.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use forecast_common::{reference_date, ForecastDataset};
use metrics::counter;
use netcdf_parser::NetCdfDataset;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::aggregate::{self, RunSummary};
use crate::config::{model_short_name, MapConfig};
use crate::download::SourceFetcher;
use crate::error::{PipelineError, PipelineResult};
use crate::pool::WorkerPool;
use crate::render::Renderer;
use crate::tasks::TaskBuilder;

/// Opens a downloaded source file.
pub trait DatasetOpener: Send + Sync {
    fn open(&self, path: &Path) -> PipelineResult<Box<dyn ForecastDataset>>;
}

/// Opens source files with the NetCDF reader.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetCdfOpener;

impl DatasetOpener for NetCdfOpener {
    fn open(&self, path: &Path) -> PipelineResult<Box<dyn ForecastDataset>> {
        let dataset = NetCdfDataset::open(path).map_err(|e| PipelineError::DatasetOpenFailure {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Box::new(dataset))
    }
}

/// Deletes the local source file when dropped, on every exit path.
pub struct SourceFileGuard {
    path: PathBuf,
}

impl SourceFileGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn remove(&self) -> PipelineResult<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PipelineError::CleanupFailure {
                path: self.path.clone(),
                message: e.to_string(),
            }),
        }
    }
}

impl Drop for SourceFileGuard {
    fn drop(&mut self) {
        match self.remove() {
            Ok(true) => info!(path = %self.path.display(), "Removed source file"),
            Ok(false) => debug!(path = %self.path.display(), "No source file to remove"),
            Err(e) => warn!(error = %e, "Source file cleanup failed"),
        }
    }
}

/// How one model's block ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelOutcome {
    Completed { summary: RunSummary },
    DownloadFailed { message: String },
    OpenFailed { message: String },
}

impl ModelOutcome {
    fn label(&self) -> &'static str {
        match self {
            ModelOutcome::Completed { .. } => "completed",
            ModelOutcome::DownloadFailed { .. } => "download_failed",
            ModelOutcome::OpenFailed { .. } => "open_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelReport {
    pub model: String,
    pub reference_date: NaiveDate,
    pub outcome: ModelOutcome,
}

/// Everything one run did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub models: Vec<ModelReport>,
}

impl RunReport {
    pub fn summaries(&self) -> impl Iterator<Item = &RunSummary> {
        self.models.iter().filter_map(|m| match &m.outcome {
            ModelOutcome::Completed { summary } => Some(summary),
            _ => None,
        })
    }

    pub fn total_failed(&self) -> usize {
        self.summaries().map(RunSummary::failed_count).sum()
    }
}

/// Drives the whole pipeline over the configured models.
pub struct Orchestrator {
    config: Arc<MapConfig>,
    fetcher: Arc<dyn SourceFetcher>,
    opener: Arc<dyn DatasetOpener>,
    pool: WorkerPool,
}

impl Orchestrator {
    pub fn new(
        config: Arc<MapConfig>,
        fetcher: Arc<dyn SourceFetcher>,
        opener: Arc<dyn DatasetOpener>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        let pool =
            WorkerPool::new(config.workers, renderer).with_task_timeout(config.task_timeout());
        Self {
            config,
            fetcher,
            opener,
            pool,
        }
    }

    pub async fn run(&self) -> PipelineResult<RunReport> {
        self.run_at(Utc::now()).await
    }

    /// Run every model as if the clock read `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> PipelineResult<RunReport> {
        self.config.validate()?;
        for dir in [&self.config.output_dir, &self.config.download_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| PipelineError::Config(format!("{}: {}", dir.display(), e)))?;
        }

        let started = Instant::now();
        let date = reference_date(now, self.config.cutoff_hour);
        info!(
            models = self.config.models.len(),
            workers = self.pool.workers(),
            reference_date = %date,
            "Starting map generation run"
        );

        let mut reports = Vec::with_capacity(self.config.models.len());
        for model in &self.config.models {
            let outcome = self.process_model(model, date).await;
            counter!("model_runs_total", "outcome" => outcome.label()).increment(1);
            reports.push(ModelReport {
                model: model.clone(),
                reference_date: date,
                outcome,
            });
        }

        info!(
            models = reports.len(),
            duration_secs = started.elapsed().as_secs_f64(),
            "Map generation run complete"
        );
        Ok(RunReport { models: reports })
    }

    /// One model's block. The guard removes the source file however the
    /// block is left, including by panic.
    pub async fn process_model(&self, model: &str, date: NaiveDate) -> ModelOutcome {
        let started = Instant::now();
        let source = self.config.source.resolve(model, date);
        let path = source.local_path(&self.config.download_dir);
        let _guard = SourceFileGuard::new(&path);

        info!(
            model = %model,
            reference_date = %date,
            path = %path.display(),
            "Processing model"
        );

        if path.exists() {
            info!(
                model = %model,
                path = %path.display(),
                "Source file already present, skipping download"
            );
        } else if let Err(e) = self.fetcher.fetch(&source.url, &path).await {
            error!(model = %model, error = %e, "Download failed, skipping model");
            return ModelOutcome::DownloadFailed {
                message: e.to_string(),
            };
        }

        // Reading is synchronous and heavy, so open and build on the blocking
        // pool. Tasks own their data; the dataset closes before rendering.
        let opener = self.opener.clone();
        let config = self.config.clone();
        let (owned_model, open_path) = (model.to_string(), path.clone());
        let built = tokio::task::spawn_blocking(move || {
            let dataset = opener.open(&open_path)?;
            let tasks = TaskBuilder::new(&config, &owned_model, date).build(dataset.as_ref());
            Ok::<_, PipelineError>(tasks)
        })
        .await;

        let tasks = match built {
            Ok(Ok(tasks)) => tasks,
            Ok(Err(e)) => {
                error!(model = %model, error = %e, "Failed to open dataset, skipping model");
                return ModelOutcome::OpenFailed {
                    message: e.to_string(),
                };
            }
            Err(e) => {
                error!(model = %model, error = %e, "Dataset reader failed, skipping model");
                return ModelOutcome::OpenFailed {
                    message: format!("dataset reader failed: {}", e),
                };
            }
        };
        debug!(model = %model, "Dataset closed");

        let short = model_short_name(model);
        counter!("map_tasks_built_total", "model" => short.to_string())
            .increment(tasks.len() as u64);
        info!(model = %model, tasks = tasks.len(), "Rendering batch");

        let summary = aggregate::drain(short, self.pool.submit(tasks)).await;

        info!(
            model = %model,
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed_count(),
            duration_secs = started.elapsed().as_secs_f64(),
            "Model complete"
        );
        ModelOutcome::Completed { summary }
    }
}
