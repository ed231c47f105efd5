//! [`ForecastDataset`] backed by a NetCDF-4 file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use forecast_common::{ForecastDataset, ForecastError, ForecastResult, GridSeries};
use tracing::debug;

use crate::cf_time::TimeUnits;
use crate::error::{NetCdfError, NetCdfResult};
use crate::native::{get_str_attr, silence_hdf5_errors, Packing};

const LAT_NAMES: [&str; 2] = ["latitude", "lat"];
const LON_NAMES: [&str; 2] = ["longitude", "lon"];
const TIME_NAMES: [&str; 2] = ["time", "valid_time"];
const LEVEL_NAMES: [&str; 4] = ["level", "isobaricInhPa", "plev", "pressure_level"];

/// An open forecast file.
///
/// Coordinate axes are read once at open; variables are read from disk on
/// each [`ForecastDataset::load`] call and returned fully in memory.
/// Variables are expected as `(time, lat, lon)` or `(time, level, lat, lon)`.
pub struct NetCdfDataset {
    file: netcdf::File,
    path: PathBuf,
    times: Vec<DateTime<Utc>>,
    lats: Vec<f64>,
    lons: Vec<f64>,
}

impl NetCdfDataset {
    pub fn open(path: impl AsRef<Path>) -> NetCdfResult<Self> {
        silence_hdf5_errors();

        let path = path.as_ref().to_path_buf();
        let file = netcdf::open(&path)?;

        let lats = read_axis(&file, &LAT_NAMES)?;
        let lons = read_axis(&file, &LON_NAMES)?;
        let times = read_times(&file)?;

        debug!(
            path = %path.display(),
            leads = times.len(),
            lats = lats.len(),
            lons = lons.len(),
            "Opened NetCDF dataset"
        );

        Ok(Self {
            file,
            path,
            times,
            lats,
            lons,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    /// Names of all variables in the file.
    pub fn variable_names(&self) -> Vec<String> {
        self.file.variables().map(|v| v.name()).collect()
    }

    fn level_index(&self, dimension: &str, wanted: f64) -> NetCdfResult<Option<usize>> {
        let var = self
            .file
            .variable(dimension)
            .ok_or_else(|| NetCdfError::MissingData(format!("{} coordinate", dimension)))?;
        let mut levels: Vec<f64> = var.get_values(..)?;
        if get_str_attr(&var, "units").as_deref() == Some("Pa") {
            levels.iter_mut().for_each(|l| *l /= 100.0);
        }
        Ok(levels.iter().position(|&l| (l - wanted).abs() < 1e-6))
    }
}

impl ForecastDataset for NetCdfDataset {
    fn contains(&self, variable: &str) -> bool {
        self.file.variable(variable).is_some()
    }

    fn lead_count(&self) -> usize {
        self.times.len()
    }

    fn load(&self, variable: &str, level: Option<f64>) -> ForecastResult<GridSeries> {
        let var = self
            .file
            .variable(variable)
            .ok_or_else(|| ForecastError::MissingVariable(variable.to_string()))?;

        let dims: Vec<(String, usize)> = var
            .dimensions()
            .iter()
            .map(|d| (d.name(), d.len()))
            .collect();
        let (nt, ny, nx) = (self.times.len(), self.lats.len(), self.lons.len());

        let spatial_ok = dims.len() >= 3
            && dims[dims.len() - 2].1 == ny
            && dims[dims.len() - 1].1 == nx
            && dims[0].1 == nt;
        if !spatial_ok {
            return Err(ForecastError::ShapeMismatch(format!(
                "'{}' has dimensions {:?}, expected (time, [level,] lat, lon) = ({}, {}, {})",
                variable, dims, nt, ny, nx
            )));
        }

        let mut values: Vec<f32> = match (dims.len(), level) {
            (3, None) => var.get_values((0..nt, 0..ny, 0..nx)).map_err(NetCdfError::from)?,
            (3, Some(wanted)) => {
                return Err(ForecastError::MissingLevel {
                    variable: variable.to_string(),
                    level: wanted,
                })
            }
            (4, Some(wanted)) => {
                let level_dim = &dims[1].0;
                if !LEVEL_NAMES.contains(&level_dim.as_str()) {
                    debug!(
                        variable,
                        dimension = %level_dim,
                        "Treating second dimension as pressure level"
                    );
                }
                let li = self
                    .level_index(level_dim, wanted)?
                    .ok_or_else(|| ForecastError::MissingLevel {
                        variable: variable.to_string(),
                        level: wanted,
                    })?;
                var.get_values((0..nt, li..li + 1, 0..ny, 0..nx))
                    .map_err(NetCdfError::from)?
            }
            (4, None) => {
                return Err(ForecastError::ShapeMismatch(format!(
                    "'{}' has {} pressure levels; one must be selected",
                    variable, dims[1].1
                )))
            }
            _ => {
                return Err(ForecastError::ShapeMismatch(format!(
                    "'{}' has unsupported rank {}",
                    variable,
                    dims.len()
                )))
            }
        };

        Packing::of(&var).apply(&mut values);

        GridSeries::new(
            self.times.clone(),
            self.lats.clone(),
            self.lons.clone(),
            values,
        )
    }
}

fn find_variable<'f>(file: &'f netcdf::File, names: &[&str]) -> NetCdfResult<netcdf::Variable<'f>> {
    names
        .iter()
        .find_map(|name| file.variable(name))
        .ok_or_else(|| NetCdfError::MissingData(format!("coordinate variable {:?}", names)))
}

fn read_axis(file: &netcdf::File, names: &[&str]) -> NetCdfResult<Vec<f64>> {
    let var = find_variable(file, names)?;
    Ok(var.get_values(..)?)
}

fn read_times(file: &netcdf::File) -> NetCdfResult<Vec<DateTime<Utc>>> {
    let var = find_variable(file, &TIME_NAMES)?;
    let units = get_str_attr(&var, "units")
        .ok_or_else(|| NetCdfError::MissingData("time units attribute".to_string()))?;
    let units = TimeUnits::parse(&units)?;
    let raw: Vec<f64> = var.get_values(..)?;
    raw.into_iter().map(|v| units.to_datetime(v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = NetCdfDataset::open(dir.path().join("absent.nc"));
        assert!(result.is_err());
    }

    #[test]
    fn test_open_non_netcdf_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.nc");
        std::fs::write(&path, b"not a netcdf file").unwrap();
        let err = NetCdfDataset::open(&path).err().unwrap();
        assert!(matches!(err, NetCdfError::Library(_)));
    }
}
