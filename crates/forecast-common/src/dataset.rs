//! Read access to one model run's gridded data.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{ForecastError, ForecastResult};
use crate::grid::GridSeries;

/// One opened forecast dataset.
///
/// Implementations may be lazy (reading from disk on demand); `load` must
/// return data fully detached from the backing store.
pub trait ForecastDataset {
    /// Whether the named variable exists.
    fn contains(&self, variable: &str) -> bool;

    /// Number of steps on the lead-time axis.
    fn lead_count(&self) -> usize;

    /// Load a variable's whole lead-time series into memory, optionally
    /// selecting a single pressure level (hPa).
    fn load(&self, variable: &str, level: Option<f64>) -> ForecastResult<GridSeries>;
}

/// A dataset held entirely in memory.
///
/// Used for fixtures and for callers that assemble fields themselves.
#[derive(Debug, Clone)]
pub struct MemoryDataset {
    times: Vec<DateTime<Utc>>,
    lats: Vec<f64>,
    lons: Vec<f64>,
    variables: HashMap<String, MemoryVariable>,
}

#[derive(Debug, Clone)]
struct MemoryVariable {
    /// Pressure levels for 4-D variables, `None` for surface fields.
    levels: Option<Vec<f64>>,
    /// `[lead][level][row][col]` (level axis absent for surface fields).
    values: Vec<f32>,
}

impl MemoryDataset {
    pub fn new(times: Vec<DateTime<Utc>>, lats: Vec<f64>, lons: Vec<f64>) -> Self {
        Self {
            times,
            lats,
            lons,
            variables: HashMap::new(),
        }
    }

    fn plane_len(&self) -> usize {
        self.lats.len() * self.lons.len()
    }

    /// Add a `[lead][row][col]` variable.
    pub fn insert_surface(
        &mut self,
        name: impl Into<String>,
        values: Vec<f32>,
    ) -> ForecastResult<()> {
        let name = name.into();
        let expected = self.times.len() * self.plane_len();
        if values.len() != expected {
            return Err(ForecastError::ShapeMismatch(format!(
                "'{}' needs {} values, got {}",
                name,
                expected,
                values.len()
            )));
        }
        self.variables.insert(name, MemoryVariable { levels: None, values });
        Ok(())
    }

    /// Add a `[lead][level][row][col]` variable.
    pub fn insert_levels(
        &mut self,
        name: impl Into<String>,
        levels: Vec<f64>,
        values: Vec<f32>,
    ) -> ForecastResult<()> {
        let name = name.into();
        let expected = self.times.len() * levels.len() * self.plane_len();
        if values.len() != expected {
            return Err(ForecastError::ShapeMismatch(format!(
                "'{}' needs {} values, got {}",
                name,
                expected,
                values.len()
            )));
        }
        self.variables.insert(
            name,
            MemoryVariable {
                levels: Some(levels),
                values,
            },
        );
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.variables.remove(name).is_some()
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }
}

impl ForecastDataset for MemoryDataset {
    fn contains(&self, variable: &str) -> bool {
        self.variables.contains_key(variable)
    }

    fn lead_count(&self) -> usize {
        self.times.len()
    }

    fn load(&self, variable: &str, level: Option<f64>) -> ForecastResult<GridSeries> {
        let var = self
            .variables
            .get(variable)
            .ok_or_else(|| ForecastError::MissingVariable(variable.to_string()))?;
        let plane = self.plane_len();

        let values = match (&var.levels, level) {
            (None, None) => var.values.clone(),
            (Some(levels), Some(wanted)) => {
                let index = levels
                    .iter()
                    .position(|&l| (l - wanted).abs() < 1e-6)
                    .ok_or_else(|| ForecastError::MissingLevel {
                        variable: variable.to_string(),
                        level: wanted,
                    })?;
                let stride = levels.len() * plane;
                (0..self.times.len())
                    .flat_map(|t| {
                        let start = t * stride + index * plane;
                        var.values[start..start + plane].iter().copied()
                    })
                    .collect()
            }
            (None, Some(wanted)) => {
                return Err(ForecastError::MissingLevel {
                    variable: variable.to_string(),
                    level: wanted,
                })
            }
            (Some(levels), None) => {
                return Err(ForecastError::ShapeMismatch(format!(
                    "'{}' has {} pressure levels; one must be selected",
                    variable,
                    levels.len()
                )))
            }
        };

        GridSeries::new(self.times.clone(), self.lats.clone(), self.lons.clone(), values)
    }
}
