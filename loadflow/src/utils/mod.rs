//! Utility functions for timestamps and the clock abstraction.

pub mod timestamps;

pub use timestamps::{
    format_iso8601, now_utc, parse_timestamp, to_storage_precision, Clock, FixedClock, SystemClock, Timestamp,
    TimestampError,
};
