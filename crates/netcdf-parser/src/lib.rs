//! NetCDF reader for gridded forecast model output.
//!
//! Opens one model run file and exposes it through
//! [`forecast_common::ForecastDataset`]. Coordinates are read at open time;
//! variables are read on demand, unpacked (`scale_factor`, `add_offset`,
//! `_FillValue`) and returned as owned [`forecast_common::GridSeries`].
//!
//! # System requirements
//!
//! Links against libnetcdf and HDF5 (`libhdf5-dev libnetcdf-dev`).

pub mod cf_time;
pub mod dataset;
pub mod error;
pub mod native;

pub use cf_time::TimeUnits;
pub use dataset::NetCdfDataset;
pub use error::{NetCdfError, NetCdfResult};
pub use native::silence_hdf5_errors;
