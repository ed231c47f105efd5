//! Shared test utilities for the forecast-maps workspace.
//!
//! - Synthetic forecast datasets ([`ForecastFixture`]) and sample render tasks
//! - Grid and pixel generators
//! - Sample file lookup ([`find_test_file`], [`require_test_file!`])
//! - [`assert_approx_eq!`] for float comparisons
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Resolve a sample model file or return early from the test.
///
/// ```ignore
/// let path = require_test_file!("FOUR_v200_GFS_2024011500_f000_f240_06.nc");
/// ```
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        let name: &str = $name;
        match $crate::find_test_file(name) {
            Some(path) => path,
            None => {
                eprintln!("SKIPPED: sample file '{}' not found (set TEST_DATA_DIR)", name);
                return;
            }
        }
    }};
}

/// Assert `|left - right| <= epsilon`, comparing as `f64`. An optional
/// trailing format string is appended to the panic message.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {
        $crate::assert_approx_eq!($left, $right, $epsilon, "")
    };
    ($left:expr, $right:expr, $epsilon:expr, $($msg:tt)+) => {{
        let (left, right, epsilon) = ($left as f64, $right as f64, $epsilon as f64);
        let diff = (left - right).abs();
        // NaN on either side never compares equal
        if !(diff <= epsilon) {
            panic!(
                "assertion failed: {} ≈ {} (diff {} > {}) {}",
                left,
                right,
                diff,
                epsilon,
                format_args!($($msg)+)
            );
        }
    }};
}
