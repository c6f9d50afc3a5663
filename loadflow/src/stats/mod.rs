//! Timing statistics derived from stage timestamps.

mod timings;

pub use timings::{compute_timings, format_duration, StageDuration, StageTimings};
