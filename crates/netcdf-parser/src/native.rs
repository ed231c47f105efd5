//! Thin helpers over the native netcdf library.

use std::sync::Once;

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose error messages to stderr even when errors
/// are handled gracefully by the Rust code (e.g., when checking for optional
/// attributes that don't exist). This creates confusing log spam like:
///
/// ```text
/// HDF5-DIAG: Error detected in HDF5 (1.10.8) thread 3:
///   #003: ../../../src/H5Adense.c line 397 in H5A__dense_open(): can't locate attribute in name index
/// ```
///
/// It only needs to be called once per process, but is safe to call multiple times.
/// Call it before the first file is opened.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and we're passing null pointers
        // to disable error output, which is a documented valid use.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Check if a variable has an attribute with the given name.
/// This avoids HDF5 error spam when checking for optional attributes.
pub(crate) fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

pub(crate) fn get_f32_attr(var: &netcdf::Variable, name: &str) -> Option<f32> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f32::try_from(attr_value).ok()
}

pub(crate) fn get_str_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

/// Packing parameters of a variable (`scale_factor`, `add_offset`,
/// `_FillValue` / `missing_value`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Packing {
    pub scale: f32,
    pub offset: f32,
    pub fill: Option<f32>,
    pub missing: Option<f32>,
}

impl Packing {
    pub fn of(var: &netcdf::Variable) -> Self {
        Self {
            scale: get_f32_attr(var, "scale_factor").unwrap_or(1.0),
            offset: get_f32_attr(var, "add_offset").unwrap_or(0.0),
            fill: get_f32_attr(var, "_FillValue"),
            missing: get_f32_attr(var, "missing_value"),
        }
    }

    /// Unpack raw values in place; fill and missing values become NaN.
    pub fn apply(&self, values: &mut [f32]) {
        for v in values.iter_mut() {
            if self.fill == Some(*v) || self.missing == Some(*v) {
                *v = f32::NAN;
            } else {
                *v = *v * self.scale + self.offset;
            }
        }
    }
}
