//! Time handling utilities for forecast runs.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, ForecastResult};

/// A lead-time index on the dataset's time axis and its label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSpec {
    pub index: usize,
    pub label: String,
}

impl LeadSpec {
    pub fn new(index: usize, label: impl Into<String>) -> Self {
        Self {
            index,
            label: label.into(),
        }
    }
}

/// Model initialization date for a run started at `now`.
///
/// Before `cutoff_hour` UTC the current day's 00Z run is not yet published,
/// so the previous calendar day is used.
pub fn reference_date(now: DateTime<Utc>, cutoff_hour: u32) -> NaiveDate {
    let today = now.date_naive();
    if now.hour() < cutoff_hour {
        today.pred_opt().unwrap_or(today)
    } else {
        today
    }
}

/// Check a strftime pattern so formatting can never fail later.
pub fn validate_time_format(format: &str) -> ForecastResult<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ForecastError::InvalidTime(format!(
            "invalid time format pattern '{}'",
            format
        )));
    }
    Ok(())
}

/// Valid-time caption: the slice timestamp shifted by a fixed offset.
pub fn valid_time_label(time: DateTime<Utc>, offset_hours: i64, format: &str) -> String {
    (time + Duration::hours(offset_hours)).format(format).to_string()
}
