//! Stage timing computation.
//!
//! Pure functions of a record and a reference time; nothing here reads a
//! clock.

use chrono::Duration;
use serde_json::{json, Value};

use crate::core::LoadingRecord;
use crate::stages::StageId;
use crate::utils::Timestamp;

/// Time spent between two consecutive stage completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDuration {
    /// Earlier stage.
    pub from: StageId,
    /// Following stage.
    pub to: StageId,
    /// `completed_at(to) - completed_at(from)`.
    pub duration: Duration,
}

/// Timing summary of one loading record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTimings {
    /// Time since stage 1 was completed; zero until then.
    pub elapsed_since_arrival: Duration,
    /// Stage 1 to stage 5 completion, only once finalized.
    pub total_process_duration: Option<Duration>,
    /// Durations for each consecutive pair with both timestamps set.
    pub per_stage_durations: Vec<StageDuration>,
    /// Mean of `per_stage_durations`, zero when there are none.
    pub average_per_stage_duration: Duration,
}

impl StageTimings {
    /// JSON view with durations in whole seconds.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "elapsed_since_arrival_seconds": self.elapsed_since_arrival.num_seconds(),
            "total_process_duration_seconds": self.total_process_duration.map(|d| d.num_seconds()),
            "per_stage_durations": self
                .per_stage_durations
                .iter()
                .map(|d| json!({
                    "from": d.from.get(),
                    "to": d.to.get(),
                    "seconds": d.duration.num_seconds(),
                }))
                .collect::<Vec<_>>(),
            "average_per_stage_duration_seconds": self.average_per_stage_duration.num_seconds(),
        })
    }
}

/// Computes the timing summary of `record` as of `now`.
///
/// A stage timestamp is written when the stage is left, so a record still
/// sitting at stage 1 reports zero elapsed time.
#[must_use]
pub fn compute_timings(record: &LoadingRecord, now: Timestamp) -> StageTimings {
    let arrival = record.completed_at(StageId::ARRIVAL);

    let elapsed_since_arrival = arrival.map_or_else(Duration::zero, |t1| (now - t1).max(Duration::zero()));

    let total_process_duration = if record.is_terminal() {
        arrival
            .zip(record.completed_at(StageId::DOCUMENTATION))
            .map(|(t1, t5)| t5 - t1)
    } else {
        None
    };

    let per_stage_durations: Vec<StageDuration> = StageId::all()
        .filter_map(|from| from.next().map(|to| (from, to)))
        .filter(|(_, to)| !to.is_terminal())
        .filter_map(|(from, to)| {
            let start = record.completed_at(from)?;
            let end = record.completed_at(to)?;
            Some(StageDuration {
                from,
                to,
                duration: end - start,
            })
        })
        .collect();

    StageTimings {
        elapsed_since_arrival,
        total_process_duration,
        average_per_stage_duration: average(&per_stage_durations),
        per_stage_durations,
    }
}

fn average(durations: &[StageDuration]) -> Duration {
    let Ok(count) = i32::try_from(durations.len()) else {
        return Duration::zero();
    };
    if count == 0 {
        return Duration::zero();
    }
    let total = durations.iter().fold(Duration::zero(), |acc, d| acc + d.duration);
    total / count
}

/// Renders a duration for dashboards: `"1h 05min"`, `"12min"` or `"45s"`.
///
/// Negative durations render as `"0s"`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}h {minutes:02}min")
    } else if minutes > 0 {
        format!("{minutes}min")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{self, base_time, STAGE_SPACING_MINUTES};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_two_completed_stages() {
        // stage 1 at T0+30min, stage 2 at T0+60min, sitting at stage 3
        let record = fixtures::record_at(3);
        let timings = compute_timings(&record, base_time() + Duration::hours(2));

        assert_eq!(timings.per_stage_durations.len(), 1);
        assert_eq!(timings.per_stage_durations[0].from, StageId::ARRIVAL);
        assert_eq!(timings.per_stage_durations[0].duration, Duration::minutes(30));
        assert_eq!(timings.average_per_stage_duration, Duration::minutes(30));
        assert_eq!(timings.total_process_duration, None);
        assert_eq!(timings.elapsed_since_arrival, Duration::minutes(90));
    }

    #[test]
    fn test_fresh_record_reports_zero() {
        let record = fixtures::record_at(1);
        let timings = compute_timings(&record, base_time() + Duration::hours(5));

        assert_eq!(timings.elapsed_since_arrival, Duration::zero());
        assert!(timings.per_stage_durations.is_empty());
        assert_eq!(timings.average_per_stage_duration, Duration::zero());
        assert_eq!(timings.total_process_duration, None);
    }

    #[test]
    fn test_finalized_record_has_total() {
        let record = fixtures::record_at(6);
        let timings = compute_timings(&record, base_time() + Duration::hours(4));

        let span = Duration::minutes(STAGE_SPACING_MINUTES);
        assert_eq!(timings.total_process_duration, Some(span * 4));
        assert_eq!(timings.per_stage_durations.len(), 4);
        assert!(timings.per_stage_durations.iter().all(|d| d.duration == span));
        assert_eq!(timings.average_per_stage_duration, span);
    }

    #[test]
    fn test_elapsed_never_negative() {
        let record = fixtures::record_at(2);
        let timings = compute_timings(&record, base_time());
        assert_eq!(timings.elapsed_since_arrival, Duration::zero());
    }

    #[test]
    fn test_to_json_uses_seconds() {
        let record = fixtures::record_at(3);
        let value = compute_timings(&record, base_time() + Duration::hours(1)).to_json();
        assert_eq!(value["average_per_stage_duration_seconds"], 1800);
        assert_eq!(value["per_stage_durations"][0]["to"], 2);
        assert!(value["total_process_duration_seconds"].is_null());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::minutes(65)), "1h 05min");
        assert_eq!(format_duration(Duration::minutes(12)), "12min");
        assert_eq!(format_duration(Duration::seconds(45)), "45s");
        assert_eq!(format_duration(Duration::hours(26)), "26h 00min");
        assert_eq!(format_duration(Duration::seconds(-5)), "0s");
    }
}
