//! Timestamp helpers and the injectable clock.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SubsecRound, TimeZone, Utc};
use parking_lot::RwLock;
use std::fmt;
use thiserror::Error;

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Errors that can occur during timestamp parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    /// The timestamp string is empty.
    #[error("Empty timestamp string")]
    EmptyString,

    /// The timestamp value is invalid.
    #[error("Invalid timestamp: {0}")]
    InvalidFormat(String),
}

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Truncates to microseconds, the precision [`format_iso8601`] keeps.
#[must_use]
pub fn to_storage_precision(dt: Timestamp) -> Timestamp {
    dt.trunc_subsecs(6)
}

/// Formats a timestamp as ISO 8601 with microseconds and explicit offset.
#[must_use]
pub fn format_iso8601(dt: &Timestamp) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Parses a timestamp as returned by the relational store.
///
/// Supports:
/// - RFC 3339 (`2024-03-01T08:00:00Z`, `2024-03-01T08:00:00.5+00:00`)
/// - Postgres text output (`2024-03-01 08:00:00.123456+00`)
/// - Naive date-times and dates, interpreted as UTC
/// - Unix seconds
pub fn parse_timestamp(input: &str) -> Result<Timestamp, TimestampError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(TimestampError::EmptyString);
    }

    if let Ok(secs) = trimmed.parse::<i64>() {
        return Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| TimestampError::InvalidFormat(trimmed.to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Some(naive) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    Err(TimestampError::InvalidFormat(trimmed.to_string()))
}

/// Source of "now" for stage completion and statistics.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        now_utc()
    }
}

/// A manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<Timestamp>,
}

impl FixedClock {
    /// Creates a clock frozen at `now`.
    #[must_use]
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: Timestamp) {
        *self.now.write() = now;
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse_timestamp("2024-03-01T08:30:00Z").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day(), dt.hour(), dt.minute()), (2024, 3, 1, 8, 30));
    }

    #[test]
    fn test_parse_postgres_text() {
        let dt = parse_timestamp("2024-03-01 08:30:00.123456+00").unwrap();
        assert_eq!(dt.hour(), 8);
        assert_eq!(dt.nanosecond(), 123_456_000);

        let shifted = parse_timestamp("2024-03-01 05:30:00-03").unwrap();
        assert_eq!(shifted.hour(), 8);
    }

    #[test]
    fn test_parse_naive_and_date_only() {
        assert_eq!(parse_timestamp("2024-03-01 08:30:00").unwrap().hour(), 8);
        assert_eq!(parse_timestamp("2024-03-01").unwrap().hour(), 0);
    }

    #[test]
    fn test_parse_unix_seconds() {
        assert_eq!(parse_timestamp("1709281800").unwrap().year(), 2024);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_timestamp("  "), Err(TimestampError::EmptyString));
        assert!(matches!(parse_timestamp("ontem"), Err(TimestampError::InvalidFormat(_))));
    }

    #[test]
    fn test_format_roundtrip() {
        let dt = parse_timestamp("2024-03-01T08:30:00.250Z").unwrap();
        let text = format_iso8601(&dt);
        assert_eq!(text, "2024-03-01T08:30:00.250000+00:00");
        assert_eq!(parse_timestamp(&text).unwrap(), dt);
    }

    #[test]
    fn test_storage_precision_survives_format_roundtrip() {
        let now = Utc.timestamp_opt(1_709_280_000, 790_516_632).unwrap();
        let stored = to_storage_precision(now);
        assert_eq!(stored.timestamp_subsec_nanos(), 790_516_000);
        assert_eq!(parse_timestamp(&format_iso8601(&stored)).unwrap(), stored);
    }

    #[test]
    fn test_fixed_clock_advances() {
        let start = parse_timestamp("2024-03-01T08:00:00Z").unwrap();
        let clock = FixedClock::new(start);
        clock.advance(Duration::minutes(30));
        assert_eq!(clock.now(), start + Duration::minutes(30));
    }
}
