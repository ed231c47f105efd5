//! Synthetic forecast datasets and ready-made render tasks.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, TimeZone, Utc};
use forecast_common::{
    BoundingBox, ContourOverlay, ForecastResult, MemoryDataset, RenderTask,
};

use crate::generators::{axis, grid_over, surface_temperature_celsius};

/// Fields without a vertical dimension.
pub const SURFACE_VARIABLES: [&str; 6] = ["t2", "u10", "v10", "msl", "tcwv", "skt"];

/// Fields with a pressure-level dimension.
pub const LEVEL_VARIABLES: [&str; 4] = ["r", "t", "w", "z"];

/// Pressure levels (hPa) carried by level variables.
pub const PRESSURE_LEVELS: [f64; 3] = [500.0, 700.0, 850.0];

/// Initialization time used by fixtures: 2024-01-15 00Z.
pub fn fixture_run_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Builder for an in-memory model run.
///
/// Defaults mirror a real source file: 9 six-hourly steps on a global
/// 0..360 longitude grid (1° here, to stay small) from 75°N to 15°N, with
/// every source variable present.
///
/// ```ignore
/// let dataset = ForecastFixture::new().without("skt").build()?;
/// ```
#[derive(Debug, Clone)]
pub struct ForecastFixture {
    run_time: DateTime<Utc>,
    leads: usize,
    step_hours: i64,
    lats: Vec<f64>,
    lons: Vec<f64>,
    levels: Vec<f64>,
    omitted: BTreeSet<String>,
}

impl Default for ForecastFixture {
    fn default() -> Self {
        Self {
            run_time: fixture_run_time(),
            leads: 9,
            step_hours: 6,
            lats: axis(75.0, -1.0, 61),
            lons: axis(0.0, 1.0, 360),
            levels: PRESSURE_LEVELS.to_vec(),
            omitted: BTreeSet::new(),
        }
    }
}

impl ForecastFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leads(mut self, leads: usize) -> Self {
        self.leads = leads;
        self
    }

    pub fn step_hours(mut self, hours: i64) -> Self {
        self.step_hours = hours;
        self
    }

    pub fn run_time(mut self, run_time: DateTime<Utc>) -> Self {
        self.run_time = run_time;
        self
    }

    pub fn grid(mut self, lats: Vec<f64>, lons: Vec<f64>) -> Self {
        self.lats = lats;
        self.lons = lons;
        self
    }

    pub fn levels(mut self, levels: Vec<f64>) -> Self {
        self.levels = levels;
        self
    }

    /// Leave a source variable out of the built dataset.
    pub fn without(mut self, variable: &str) -> Self {
        self.omitted.insert(variable.to_string());
        self
    }

    /// Valid time of every lead step.
    pub fn times(&self) -> Vec<DateTime<Utc>> {
        (0..self.leads)
            .map(|i| self.run_time + Duration::hours(self.step_hours * i as i64))
            .collect()
    }

    pub fn build(&self) -> ForecastResult<MemoryDataset> {
        let mut dataset = MemoryDataset::new(self.times(), self.lats.clone(), self.lons.clone());

        for name in SURFACE_VARIABLES {
            if !self.omitted.contains(name) {
                dataset.insert_surface(name, self.series(name, None))?;
            }
        }
        for name in LEVEL_VARIABLES {
            if self.omitted.contains(name) {
                continue;
            }
            let mut values = Vec::new();
            for lead in 0..self.leads {
                for &level in &self.levels {
                    values.extend(self.plane(name, Some(level), lead));
                }
            }
            dataset.insert_levels(name, self.levels.clone(), values)?;
        }
        Ok(dataset)
    }

    fn series(&self, name: &str, level: Option<f64>) -> Vec<f32> {
        (0..self.leads)
            .flat_map(|lead| self.plane(name, level, lead))
            .collect()
    }

    fn plane(&self, name: &str, level: Option<f64>, lead: usize) -> Vec<f32> {
        let mut values = Vec::with_capacity(self.lats.len() * self.lons.len());
        for &lat in &self.lats {
            for &lon in &self.lons {
                values.push(source_value(name, level, lead, lon, lat) as f32);
            }
        }
        values
    }
}

/// Plausible raw value (source units) of a variable at one point.
fn source_value(name: &str, level: Option<f64>, lead: usize, lon: f64, lat: f64) -> f64 {
    let x = lon.to_radians();
    let y = lat.to_radians();
    let t = lead as f64;
    match name {
        "t2" => 288.0 - 0.6 * (lat - 40.0) + 5.0 * (2.0 * x).sin() * y.cos() + 0.5 * t,
        "skt" => 290.0 - 0.7 * (lat - 40.0) + 6.0 * (2.0 * x).sin() * y.cos() + 0.5 * t,
        "u10" => 8.0 * (3.0 * y + 0.3 * t).sin(),
        "v10" => 6.0 * (2.0 * x + 0.2 * t).cos(),
        "msl" => 101_325.0 + 1_500.0 * (3.0 * x).sin() * (2.0 * y).cos(),
        "tcwv" => (45.0 - 0.6 * (lat - 15.0) + 5.0 * (4.0 * x).sin()).max(1.0),
        "r" => (60.0 + 30.0 * (4.0 * x + 2.0 * y + 0.1 * t).sin()).clamp(0.0, 100.0),
        "t" => {
            let base = match level.unwrap_or(850.0) as i64 {
                500 => 252.0,
                700 => 266.0,
                _ => 276.0,
            };
            base - 0.5 * (lat - 40.0) + 3.0 * (3.0 * x).sin()
        }
        "w" => 0.8 * (5.0 * x + 0.4 * t).sin() * (3.0 * y).cos(),
        "z" => {
            let base = match level.unwrap_or(500.0) as i64 {
                500 => 5_600.0,
                700 => 3_000.0,
                _ => 1_500.0,
            };
            9.806_65 * (base - 8.0 * (lat - 40.0) + 60.0 * (2.0 * x).sin())
        }
        _ => 0.0,
    }
}

/// The Turkey domain box.
pub fn turkey_bbox() -> BoundingBox {
    BoundingBox::new(25.0, 34.0, 45.0, 43.0)
}

/// A self-contained temperature task over Turkey, suitable for driving the
/// renderer directly.
pub fn sample_render_task(filename: &str) -> ForecastResult<RenderTask> {
    let bbox = turkey_bbox();
    let field = grid_over(
        &bbox.expand(0.5, 0.5),
        0.5,
        fixture_run_time(),
        surface_temperature_celsius,
    )?;
    Ok(RenderTask {
        model: "FOUR".to_string(),
        variable: "t2".to_string(),
        field,
        contours: None,
        title: "FOUR AI Model - 20240115 00Z".to_string(),
        subtitle: "2m Temperature".to_string(),
        valid_time: "15 Jan 03:00".to_string(),
        lead_label: "f000".to_string(),
        filename: filename.to_string(),
        unit: "°C".to_string(),
        colormap: "Spectral_r".to_string(),
        fill_levels: (0..56).map(|i| -15.0 + i as f64).collect(),
        extent: bbox,
    })
}

/// Like [`sample_render_task`] with geopotential-height lines on top.
pub fn sample_contour_task(filename: &str) -> ForecastResult<RenderTask> {
    let mut task = sample_render_task(filename)?;
    let bbox = task.extent.expand(0.5, 0.5);
    let grid = grid_over(&bbox, 0.5, fixture_run_time(), |lon, lat| {
        (5_600.0 - 8.0 * (lat - 40.0) + 60.0 * (2.0 * lon.to_radians()).sin()) as f32
    })?;
    task.variable = "z".to_string();
    task.subtitle = "500 hPa Geopotential".to_string();
    task.contours = Some(ContourOverlay {
        grid,
        levels: (0..20).map(|i| 4_800.0 + 60.0 * i as f64).collect(),
    });
    Ok(task)
}
