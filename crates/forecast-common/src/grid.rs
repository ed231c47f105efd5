//! In-memory lat/lon grids.
//!
//! A [`GridSeries`] is a fully loaded variable over every lead step; a
//! [`Grid2D`] is one lead of it. Both own their data and carry their own
//! coordinate axes, so a slice can be handed to another thread without any
//! reference back to the dataset it came from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::error::{ForecastError, ForecastResult};
use crate::variable::UnitTransform;

/// A single 2-D field on a regular lat/lon grid.
///
/// Values are row-major: row `i` corresponds to `lats[i]`, column `j` to
/// `lons[j]`. Latitudes may run north-to-south or south-to-north; longitudes
/// are increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid2D {
    pub valid_time: DateTime<Utc>,
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
    pub values: Vec<f32>,
}

impl Grid2D {
    pub fn new(
        valid_time: DateTime<Utc>,
        lats: Vec<f64>,
        lons: Vec<f64>,
        values: Vec<f32>,
    ) -> ForecastResult<Self> {
        if lats.len() * lons.len() != values.len() {
            return Err(ForecastError::ShapeMismatch(format!(
                "{} lats x {} lons does not match {} values",
                lats.len(),
                lons.len(),
                values.len()
            )));
        }
        Ok(Self {
            valid_time,
            lats,
            lons,
            values,
        })
    }

    pub fn width(&self) -> usize {
        self.lons.len()
    }

    pub fn height(&self) -> usize {
        self.lats.len()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.height() || col >= self.width() {
            return None;
        }
        self.values.get(row * self.width() + col).copied()
    }

    /// Minimum and maximum of the finite values.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.values
            .iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Cut the grid down to `bbox` plus `margin_cells` grid cells on each side.
    ///
    /// Longitudes are re-expressed in the frame of the box, so a 0..360 grid
    /// cropped to a box starting at -20 yields columns from -20 upwards with
    /// the wrapped columns moved to the front.
    pub fn crop(&self, bbox: &BoundingBox, margin_cells: usize) -> ForecastResult<Grid2D> {
        let lon_step = axis_step(&self.lons);
        let lat_step = axis_step(&self.lats);
        let window = bbox.expand(lon_step * margin_cells as f64, lat_step * margin_cells as f64);

        let frame_start = window.min_x;
        let mut columns: Vec<(f64, usize)> = self
            .lons
            .iter()
            .enumerate()
            .map(|(j, &lon)| (wrap_from(lon, frame_start), j))
            .filter(|(lon, _)| *lon <= window.max_x)
            .collect();
        columns.sort_by(|a, b| a.0.total_cmp(&b.0));
        columns.dedup_by(|a, b| (a.0 - b.0).abs() < 1e-9);

        let rows: Vec<usize> = self
            .lats
            .iter()
            .enumerate()
            .filter(|&(_, &lat)| lat >= window.min_y && lat <= window.max_y)
            .map(|(i, _)| i)
            .collect();

        if columns.len() < 2 || rows.len() < 2 {
            return Err(ForecastError::OutsideGrid(format!(
                "box {:?} keeps {} columns and {} rows",
                bbox.extent(),
                columns.len(),
                rows.len()
            )));
        }

        let width = self.width();
        let mut values = Vec::with_capacity(rows.len() * columns.len());
        for &row in &rows {
            let base = row * width;
            values.extend(columns.iter().map(|&(_, col)| self.values[base + col]));
        }

        Ok(Grid2D {
            valid_time: self.valid_time,
            lats: rows.iter().map(|&i| self.lats[i]).collect(),
            lons: columns.iter().map(|&(lon, _)| lon).collect(),
            values,
        })
    }

    /// Bilinear sample at a geographic point. `None` outside the grid or
    /// when the surrounding cells are missing.
    pub fn sample(&self, lon: f64, lat: f64) -> Option<f32> {
        let y = axis_position(&self.lats, lat)?;
        let x = [lon, lon - 360.0, lon + 360.0]
            .into_iter()
            .find_map(|candidate| axis_position(&self.lons, candidate))?;
        self.sample_index(x, y)
    }

    /// Bilinear sample at fractional (column, row) indices.
    pub fn sample_index(&self, x: f64, y: f64) -> Option<f32> {
        let width = self.width();
        let height = self.height();
        if width == 0 || height == 0 || x < 0.0 || y < 0.0 {
            return None;
        }

        let x1 = (x.floor() as usize).min(width - 1);
        let y1 = (y.floor() as usize).min(height - 1);
        let x2 = (x1 + 1).min(width - 1);
        let y2 = (y1 + 1).min(height - 1);
        let dx = (x - x1 as f64) as f32;
        let dy = (y - y1 as f64) as f32;

        let v11 = self.values[y1 * width + x1];
        let v21 = self.values[y1 * width + x2];
        let v12 = self.values[y2 * width + x1];
        let v22 = self.values[y2 * width + x2];

        let v1 = v11 * (1.0 - dx) + v21 * dx;
        let v2 = v12 * (1.0 - dx) + v22 * dx;
        let value = v1 * (1.0 - dy) + v2 * dy;

        if value.is_finite() {
            Some(value)
        } else {
            None
        }
    }

    /// Geographic coordinates of a fractional (column, row) index.
    pub fn coordinates_at(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        Some((interpolate_axis(&self.lons, x)?, interpolate_axis(&self.lats, y)?))
    }
}

/// A variable fully loaded over the lead-time axis.
///
/// Values are laid out `[lead][row][col]`.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSeries {
    pub times: Vec<DateTime<Utc>>,
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
    pub values: Vec<f32>,
}

impl GridSeries {
    pub fn new(
        times: Vec<DateTime<Utc>>,
        lats: Vec<f64>,
        lons: Vec<f64>,
        values: Vec<f32>,
    ) -> ForecastResult<Self> {
        let expected = times.len() * lats.len() * lons.len();
        if expected != values.len() {
            return Err(ForecastError::ShapeMismatch(format!(
                "{} steps x {} lats x {} lons needs {} values, got {}",
                times.len(),
                lats.len(),
                lons.len(),
                expected,
                values.len()
            )));
        }
        Ok(Self {
            times,
            lats,
            lons,
            values,
        })
    }

    pub fn lead_count(&self) -> usize {
        self.times.len()
    }

    fn plane_len(&self) -> usize {
        self.lats.len() * self.lons.len()
    }

    /// Copy out one lead step.
    pub fn slice(&self, lead: usize) -> ForecastResult<Grid2D> {
        let time = *self.times.get(lead).ok_or(ForecastError::LeadOutOfRange {
            lead,
            available: self.times.len(),
        })?;
        let plane = self.plane_len();
        let start = lead * plane;
        Ok(Grid2D {
            valid_time: time,
            lats: self.lats.clone(),
            lons: self.lons.clone(),
            values: self.values[start..start + plane].to_vec(),
        })
    }

    pub fn map(mut self, f: impl Fn(f32) -> f32) -> Self {
        self.values.iter_mut().for_each(|v| *v = f(*v));
        self
    }

    pub fn transform(self, transform: UnitTransform) -> Self {
        if transform.is_identity() {
            return self;
        }
        self.map(|v| transform.apply(v))
    }

    /// Combine two series cell by cell. Both must share the same shape.
    pub fn combine(
        mut self,
        other: &GridSeries,
        f: impl Fn(f32, f32) -> f32,
    ) -> ForecastResult<Self> {
        if self.values.len() != other.values.len()
            || self.lats.len() != other.lats.len()
            || self.lons.len() != other.lons.len()
        {
            return Err(ForecastError::ShapeMismatch(format!(
                "cannot combine {}x{}x{} with {}x{}x{}",
                self.times.len(),
                self.lats.len(),
                self.lons.len(),
                other.times.len(),
                other.lats.len(),
                other.lons.len()
            )));
        }
        self.values
            .iter_mut()
            .zip(&other.values)
            .for_each(|(a, &b)| *a = f(*a, b));
        Ok(self)
    }
}

/// Absolute spacing between the first two axis entries.
fn axis_step(axis: &[f64]) -> f64 {
    match axis {
        [a, b, ..] => (b - a).abs(),
        _ => 0.0,
    }
}

/// Shift `lon` by whole turns so it lies in `[start, start + 360)`.
fn wrap_from(lon: f64, start: f64) -> f64 {
    start + (lon - start).rem_euclid(360.0)
}

/// Fractional index of `value` along a monotonic axis (either direction).
pub fn axis_position(axis: &[f64], value: f64) -> Option<f64> {
    match axis.len() {
        0 => None,
        1 => ((axis[0] - value).abs() < 1e-9).then_some(0.0),
        n => {
            let ascending = axis[n - 1] >= axis[0];
            let (lo, hi) = if ascending {
                (axis[0], axis[n - 1])
            } else {
                (axis[n - 1], axis[0])
            };
            if value < lo || value > hi {
                return None;
            }
            let upper = if ascending {
                axis.partition_point(|&a| a <= value)
            } else {
                axis.partition_point(|&a| a >= value)
            };
            let i = upper.saturating_sub(1).min(n - 2);
            let span = axis[i + 1] - axis[i];
            let frac = if span.abs() < f64::EPSILON {
                0.0
            } else {
                (value - axis[i]) / span
            };
            Some(i as f64 + frac.clamp(0.0, 1.0))
        }
    }
}

/// Coordinate value at a fractional index.
fn interpolate_axis(axis: &[f64], position: f64) -> Option<f64> {
    if axis.is_empty() || position < 0.0 || position > (axis.len() - 1) as f64 {
        return None;
    }
    let i = (position.floor() as usize).min(axis.len() - 1);
    let j = (i + 1).min(axis.len() - 1);
    let t = position - i as f64;
    Some(axis[i] + (axis[j] - axis[i]) * t)
}
