//! CF-convention time coordinates (`"<unit> since <epoch>"`).

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::error::{NetCdfError, NetCdfResult};

/// A parsed `units` attribute of a time coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeUnits {
    /// Length of one unit in seconds.
    pub seconds_per_unit: f64,
    pub epoch: DateTime<Utc>,
}

impl TimeUnits {
    /// Parse e.g. `"hours since 2024-01-15 00:00:00"`.
    pub fn parse(units: &str) -> NetCdfResult<Self> {
        let (unit, epoch) = units
            .split_once(" since ")
            .ok_or_else(|| NetCdfError::InvalidFormat(format!("time units '{}'", units)))?;

        let seconds_per_unit = match unit.trim().to_ascii_lowercase().as_str() {
            "seconds" | "second" | "secs" | "sec" | "s" => 1.0,
            "minutes" | "minute" | "mins" | "min" => 60.0,
            "hours" | "hour" | "hrs" | "hr" | "h" => 3600.0,
            "days" | "day" | "d" => 86400.0,
            other => {
                return Err(NetCdfError::InvalidFormat(format!(
                    "unsupported time unit '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            seconds_per_unit,
            epoch: parse_epoch(epoch)?,
        })
    }

    /// Timestamp of a raw coordinate value.
    pub fn to_datetime(&self, value: f64) -> NetCdfResult<DateTime<Utc>> {
        let seconds = value * self.seconds_per_unit;
        if !seconds.is_finite() {
            return Err(NetCdfError::InvalidFormat(format!(
                "time value {} is not finite",
                value
            )));
        }
        let offset = Duration::milliseconds((seconds * 1000.0).round() as i64);
        Ok(self.epoch + offset)
    }
}

fn parse_epoch(text: &str) -> NetCdfResult<DateTime<Utc>> {
    let text = text
        .trim()
        .trim_end_matches("UTC")
        .trim_end_matches('Z')
        .trim();

    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(dt.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| NetCdfError::InvalidFormat(format!("time epoch '{}'", text)))
}
