//! Timestamp, time-of-day and datetime transforms.

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDateTime, NaiveTime};

use crate::dateutils::{self, SECONDS_PER_DAY, TimestampFormat};
use crate::transform::{CellValue, Transform, TransformContext, format_string};
use crate::value::Value;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Built-in timestamp transforms by name, including a `_date` variant of
/// every epoch.
pub(super) fn builtin() -> Vec<(String, Arc<dyn Transform>)> {
    let mut transforms: Vec<(String, Arc<dyn Transform>)> = Vec::new();
    for name in dateutils::supported_formats() {
        let Some(format) = TimestampFormat::from_name(name) else {
            continue;
        };
        if name.ends_with("_date") {
            transforms.push((name.to_string(), Arc::new(TimestampTransform::date_only(format))));
            continue;
        }
        transforms.push((name.to_string(), Arc::new(TimestampTransform::new(format))));
        let date_name = format!("{name}_date");
        if TimestampFormat::from_name(&date_name).is_none() {
            transforms.push((date_name, Arc::new(TimestampTransform::date_only(format))));
        }
    }
    for (name, scale) in [
        ("timestamp_midnight", 1),
        ("timestamp_midnight_ms", 1_000),
        ("timestamp_midnight_Ms", 1_000_000),
    ] {
        transforms.push((name.to_string(), Arc::new(MidnightTransform::new(scale))));
    }
    transforms
}

/// Integer when `value` is whole and fits, real otherwise.
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::Integer(value as i64)
    } else {
        Value::Real(value)
    }
}

/// Calendar datetime of whole Unix seconds, limited to years 1 through 9999.
fn datetime_from_unix(seconds: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(seconds, 0)
        .map(|dt| dt.naive_utc())
        .filter(|dt| (1..=9999).contains(&dt.year()))
}

/// Renders a stored timestamp as `YYYY-MM-DD HH:MM:SS` UTC, or the date
/// alone.
///
/// Null renders as an empty string; values outside the calendar come back in
/// string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampTransform {
    format: TimestampFormat,
    date_only: bool,
}

impl TimestampTransform {
    pub fn new(format: TimestampFormat) -> Self {
        Self {
            format,
            date_only: false,
        }
    }

    pub fn date_only(format: TimestampFormat) -> Self {
        Self {
            format,
            date_only: true,
        }
    }

    pub fn format(&self) -> TimestampFormat {
        self.format
    }

    fn unix_seconds(&self, value: &Value) -> Option<i64> {
        let integer = match value {
            Value::Integer(i) => Some(*i),
            Value::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        if let Some(i) = integer
            && self.format != TimestampFormat::Julian
        {
            return self.format.to_unix_seconds(i);
        }
        let seconds = self.format.to_unix(value.as_f64()?).floor();
        (seconds.is_finite() && seconds.abs() < i64::MAX as f64).then_some(seconds as i64)
    }

    /// Render `value`, or `None` when it is not a representable timestamp.
    pub fn render(&self, value: &Value) -> Option<String> {
        let dt = datetime_from_unix(self.unix_seconds(value)?)?;
        let pattern = if self.date_only { DATE_FORMAT } else { DATETIME_FORMAT };
        Some(dt.format(pattern).to_string())
    }
}

impl Transform for TimestampTransform {
    fn apply(&self, value: &Value, ctx: &TransformContext<'_>) -> CellValue {
        if value.is_null() {
            return CellValue::Text(String::new());
        }
        CellValue::Text(self.render(value).unwrap_or_else(|| format_string(value, ctx)))
    }

    /// Unix seconds to this epoch.
    fn inverse(&self, value: &Value) -> Option<Value> {
        Some(number(self.format.from_unix(value.as_f64()?)))
    }
}

/// Renders a count of time units since midnight as `HH:MM:SS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidnightTransform {
    /// Units per second.
    scale: i64,
}

impl MidnightTransform {
    pub fn new(scale: i64) -> Self {
        Self { scale: scale.max(1) }
    }

    fn seconds(&self, value: &Value) -> Option<i64> {
        let seconds = match value {
            Value::Integer(i) => i.div_euclid(self.scale),
            other => {
                let seconds = (other.as_f64()? / self.scale as f64).floor();
                if !seconds.is_finite() || seconds.abs() >= i64::MAX as f64 {
                    return None;
                }
                seconds as i64
            }
        };
        Some(seconds.rem_euclid(SECONDS_PER_DAY))
    }
}

impl Transform for MidnightTransform {
    fn apply(&self, value: &Value, ctx: &TransformContext<'_>) -> CellValue {
        if value.is_null() {
            return CellValue::Text(String::new());
        }
        let time = self
            .seconds(value)
            .and_then(|s| u32::try_from(s).ok())
            .and_then(|s| NaiveTime::from_num_seconds_from_midnight_opt(s, 0));
        CellValue::Text(match time {
            Some(time) => time.format(TIME_FORMAT).to_string(),
            None => format_string(value, ctx),
        })
    }

    /// Seconds, of any day, to units since midnight.
    fn inverse(&self, value: &Value) -> Option<Value> {
        let seconds = value.as_f64()?.floor();
        if !seconds.is_finite() || seconds.abs() >= i64::MAX as f64 {
            return None;
        }
        (seconds as i64)
            .rem_euclid(SECONDS_PER_DAY)
            .checked_mul(self.scale)
            .map(Value::Integer)
    }
}

/// Renders Unix seconds or a date string as `YYYY-MM-DD HH:MM:SS`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatetimeTransform;

impl Transform for DatetimeTransform {
    fn apply(&self, value: &Value, ctx: &TransformContext<'_>) -> CellValue {
        if value.is_null() {
            return CellValue::Text(String::new());
        }
        let seconds = TimestampTransform::new(TimestampFormat::Unix);
        let rendered = seconds.render(value).or_else(|| {
            let text = value.as_str()?;
            let dt = dateutils::parse_string(text).ok()?;
            Some(dt.format(DATETIME_FORMAT).to_string())
        });
        CellValue::Text(rendered.unwrap_or_else(|| format_string(value, ctx)))
    }

    fn inverse(&self, value: &Value) -> Option<Value> {
        Some(value.clone())
    }
}
