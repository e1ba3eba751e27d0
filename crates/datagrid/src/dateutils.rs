//! Timestamp epochs and date parsing.
//!
//! Stored timestamps come in several epochs and units. Each
//! [`TimestampFormat`] converts between its storage unit and Unix seconds;
//! [`normalize_timestamp`] does the same by transform name.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use datagrid_core::logging::targets;

use crate::error::{GridError, Result};

pub(crate) const SECONDS_PER_DAY: i64 = 86_400;
/// Seconds from 1970-01-01 to 2001-01-01.
pub(crate) const APPLE_OFFSET: i64 = 978_307_200;
/// Seconds from 1601-01-01 to 1970-01-01.
pub(crate) const WEBKIT_OFFSET: i64 = 11_644_473_600;
/// The Unix epoch as a Julian day number.
pub(crate) const UNIX_EPOCH_JULIAN_DAY: f64 = 2_440_587.5;

/// Epoch and unit of a stored timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimestampFormat {
    /// Seconds since 1970-01-01.
    Unix,
    /// Milliseconds since 1970-01-01.
    Millis,
    /// Microseconds since 1970-01-01.
    Micros,
    /// Seconds since 2001-01-01.
    Apple,
    /// Microseconds since 1601-01-01.
    Webkit,
    /// Days since the Julian epoch.
    Julian,
}

const FORMATS: &[(&str, TimestampFormat)] = &[
    ("timestamp", TimestampFormat::Unix),
    ("timestamp_unix", TimestampFormat::Unix),
    ("timestamp_ms", TimestampFormat::Millis),
    ("timestamp_unix_ms", TimestampFormat::Millis),
    ("timestamp_Ms", TimestampFormat::Micros),
    ("timestamp_unix_Ms", TimestampFormat::Micros),
    ("timestamp_apple", TimestampFormat::Apple),
    ("timestamp_ios", TimestampFormat::Apple),
    ("timestamp_webkit", TimestampFormat::Webkit),
    ("timestamp_julian", TimestampFormat::Julian),
    ("timestamp_julian_date", TimestampFormat::Julian),
];

impl TimestampFormat {
    /// Look up a format by transform name.
    pub fn from_name(name: &str) -> Option<Self> {
        FORMATS
            .iter()
            .find(|(format_name, _)| *format_name == name)
            .map(|&(_, format)| format)
    }

    /// Storage value to Unix seconds.
    pub fn to_unix(self, value: f64) -> f64 {
        match self {
            TimestampFormat::Unix => value,
            TimestampFormat::Millis => value / 1e3,
            TimestampFormat::Micros => value / 1e6,
            TimestampFormat::Apple => value + APPLE_OFFSET as f64,
            TimestampFormat::Webkit => value / 1e6 - WEBKIT_OFFSET as f64,
            TimestampFormat::Julian => (value - UNIX_EPOCH_JULIAN_DAY) * SECONDS_PER_DAY as f64,
        }
    }

    /// Unix seconds to the storage value.
    pub fn from_unix(self, seconds: f64) -> f64 {
        match self {
            TimestampFormat::Unix => seconds,
            TimestampFormat::Millis => seconds * 1e3,
            TimestampFormat::Micros => seconds * 1e6,
            TimestampFormat::Apple => seconds - APPLE_OFFSET as f64,
            TimestampFormat::Webkit => (seconds + WEBKIT_OFFSET as f64) * 1e6,
            TimestampFormat::Julian => seconds / SECONDS_PER_DAY as f64 + UNIX_EPOCH_JULIAN_DAY,
        }
    }

    /// Integer storage value to whole Unix seconds, rounding down.
    ///
    /// Returns `None` on overflow. Julian days are fractional and always go
    /// through [`to_unix`](Self::to_unix).
    pub fn to_unix_seconds(self, value: i64) -> Option<i64> {
        match self {
            TimestampFormat::Unix => Some(value),
            TimestampFormat::Millis => Some(value.div_euclid(1_000)),
            TimestampFormat::Micros => Some(value.div_euclid(1_000_000)),
            TimestampFormat::Apple => value.checked_add(APPLE_OFFSET),
            TimestampFormat::Webkit => value.div_euclid(1_000_000).checked_sub(WEBKIT_OFFSET),
            TimestampFormat::Julian => {
                let seconds = self.to_unix(value as f64).floor();
                (seconds.abs() < i64::MAX as f64).then_some(seconds as i64)
            }
        }
    }
}

/// Every timestamp transform name understood by [`normalize_timestamp`].
pub fn supported_formats() -> impl Iterator<Item = &'static str> {
    FORMATS.iter().map(|(name, _)| *name)
}

/// Convert `value` from the named format to Unix seconds, or back when
/// `inverse` is set.
///
/// An unknown format is logged and `value` is returned unchanged.
pub fn normalize_timestamp(value: f64, format: &str, inverse: bool) -> f64 {
    match TimestampFormat::from_name(format) {
        Some(format) if inverse => format.from_unix(value),
        Some(format) => format.to_unix(value),
        None => {
            tracing::warn!(target: targets::TRANSFORM, format, "unsupported timestamp format");
            value
        }
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d-%b-%Y %H:%M:%S",
    "%d-%b-%Y %H:%M",
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d-%b-%Y", "%a, %d %b %Y", "%d %b %Y"];

/// Parse a human-entered date or date and time.
///
/// Accepts ISO 8601 forms, `4/10/2015`, `4/10/2015 04:20`, `2-Jun-2013`,
/// `2-Jun-2013 06:48:15` and `Tue, 10 Apr 2001 15:51:24`. Dates without a
/// time are at midnight.
pub fn parse_string(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
                .map(|date| date.and_time(NaiveTime::MIN))
        })
        .ok_or_else(|| GridError::InvalidDateFormat(s.to_string()))
}

/// Unix seconds of a naive UTC date and time.
pub fn unix_seconds(datetime: NaiveDateTime) -> i64 {
    datetime.and_utc().timestamp()
}
