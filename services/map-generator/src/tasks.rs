//! Task Builder: turns one opened dataset into self-contained render tasks.
//!
//! For every variable spec the whole lead-time series is pulled into memory
//! once, then sliced per lead and cropped per domain. A variable whose
//! source data is absent yields zero tasks; an error while building one
//! variable abandons only that variable.

use chrono::NaiveDate;
use forecast_common::{
    valid_time_label, ContourOverlay, Extraction, ForecastDataset, ForecastResult, GridSeries,
    RenderTask, VariableSpec,
};
use tracing::{debug, error, info};

use crate::config::{model_short_name, output_filename, MapConfig};
use crate::error::{PipelineError, PipelineResult};

/// Cells kept around each domain so fills and contours reach the frame.
const CROP_MARGIN_CELLS: usize = 1;

/// A variable's full lead-time series, ready to slice.
#[derive(Debug, Clone)]
pub struct Materialized {
    pub fill: GridSeries,
    pub lines: Option<(GridSeries, Vec<f64>)>,
}

/// Builds every render task for one model run.
pub struct TaskBuilder<'a> {
    config: &'a MapConfig,
    model_short: String,
    title: String,
}

impl<'a> TaskBuilder<'a> {
    pub fn new(config: &'a MapConfig, model: &str, run_date: NaiveDate) -> Self {
        let model_short = model_short_name(model).to_string();
        let title = format!("{} AI Model - {} 00Z", model_short, run_date.format("%Y%m%d"));
        Self {
            config,
            model_short,
            title,
        }
    }

    /// Main title shared by every task of this run.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The full ordered task list. Order is for readable logs only.
    pub fn build<D: ForecastDataset + ?Sized>(&self, dataset: &D) -> Vec<RenderTask> {
        let mut tasks = Vec::new();

        for spec in &self.config.variables {
            if let Err(e) = check_presence(dataset, spec) {
                info!(
                    model = %self.model_short,
                    variable = %spec.key,
                    reason = %e,
                    "Skipping variable"
                );
                continue;
            }

            let before = tasks.len();
            match self.build_variable(dataset, spec, &mut tasks) {
                Ok(()) => info!(
                    model = %self.model_short,
                    variable = %spec.key,
                    kind = spec.extraction.kind(),
                    tasks = tasks.len() - before,
                    "Built render tasks"
                ),
                Err(e) => error!(
                    model = %self.model_short,
                    variable = %spec.key,
                    error = %e,
                    kept = tasks.len() - before,
                    "Failed to build tasks for variable, abandoning it"
                ),
            }
        }

        tasks
    }

    /// Append one variable's tasks; on error, tasks pushed so far are kept.
    fn build_variable<D: ForecastDataset + ?Sized>(
        &self,
        dataset: &D,
        spec: &VariableSpec,
        tasks: &mut Vec<RenderTask>,
    ) -> ForecastResult<()> {
        let data = materialize(dataset, spec)?;

        for lead in &self.config.leads {
            let fill = data.fill.slice(lead.index)?;
            let valid_time = valid_time_label(
                fill.valid_time,
                self.config.valid_time_offset_hours,
                &self.config.valid_time_format,
            );
            let lines = match &data.lines {
                Some((series, levels)) => Some((series.slice(lead.index)?, levels)),
                None => None,
            };

            for domain in &self.config.domains {
                let fill_levels = self
                    .config
                    .fill_levels
                    .lookup(&spec.prefix, &domain.name)
                    .ok_or_else(|| {
                        forecast_common::ForecastError::InvalidConfig(format!(
                            "no fill levels for '{}' in '{}'",
                            spec.prefix, domain.name
                        ))
                    })?;

                let contours = match &lines {
                    Some((grid, levels)) => Some(ContourOverlay {
                        grid: grid.crop(&domain.bbox, CROP_MARGIN_CELLS)?,
                        levels: levels.to_vec(),
                    }),
                    None => None,
                };

                let filename =
                    output_filename(&spec.prefix, &lead.label, &domain.name, &self.model_short);
                debug!(filename = %filename, "Built task");

                tasks.push(RenderTask {
                    model: self.model_short.clone(),
                    variable: spec.key.clone(),
                    field: fill.crop(&domain.bbox, CROP_MARGIN_CELLS)?,
                    contours,
                    title: self.title.clone(),
                    subtitle: spec.title.clone(),
                    valid_time: valid_time.clone(),
                    lead_label: lead.label.clone(),
                    filename,
                    unit: spec.unit.clone(),
                    colormap: spec.colormap.clone(),
                    fill_levels,
                    extent: domain.bbox,
                });
            }
        }

        Ok(())
    }
}

/// Every source variable a `VariableSpec` reads must exist in the dataset.
pub fn check_presence<D: ForecastDataset + ?Sized>(
    dataset: &D,
    spec: &VariableSpec,
) -> PipelineResult<()> {
    let missing: Vec<&str> = spec
        .extraction
        .required_variables()
        .into_iter()
        .filter(|name| !dataset.contains(name))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::MissingVariable(missing.join(", ")))
    }
}

/// Load a spec's whole lead-time series, derived and unit-converted.
pub fn materialize<D: ForecastDataset + ?Sized>(
    dataset: &D,
    spec: &VariableSpec,
) -> ForecastResult<Materialized> {
    let materialized = match &spec.extraction {
        Extraction::Direct { variable } => Materialized {
            fill: dataset.load(variable, None)?.transform(spec.transform),
            lines: None,
        },
        Extraction::LevelSelect { variable, level } => Materialized {
            fill: dataset.load(variable, Some(*level))?.transform(spec.transform),
            lines: None,
        },
        // Components carry their own transforms
        Extraction::Combination {
            fill,
            lines,
            line_levels,
        } => Materialized {
            fill: dataset.load(&fill.variable, fill.level)?.transform(fill.transform),
            lines: Some((
                dataset.load(&lines.variable, lines.level)?.transform(lines.transform),
                line_levels.values(),
            )),
        },
        Extraction::Magnitude { x, y } => {
            let y_series = dataset.load(y, None)?;
            let magnitude = dataset
                .load(x, None)?
                .combine(&y_series, |u, v| u.hypot(v))?;
            Materialized {
                fill: magnitude.transform(spec.transform),
                lines: None,
            }
        }
    };
    Ok(materialized)
}
