// libs/appointment-cell/src/services/slots.rs
use chrono::{Duration, NaiveTime};

use crate::models::TimeInterval;

/// Candidate start times for a service of `duration_minutes`, ascending.
///
/// Starts at `opening_time` and advances by `step_minutes`. A start is emitted
/// while `start + duration <= closing_time`; a slot ending exactly at closing is
/// valid. The step does not depend on the duration, so a 45 minute service can
/// start at 09:00, 09:30, 10:00... and its slots do not line up with the end
/// times of other services.
///
/// Cloning the iterator restarts the sequence from its current position.
#[derive(Debug, Clone)]
pub struct CandidateSlots {
    current: Option<NaiveTime>,
    duration: Duration,
    step: Duration,
    closing_time: NaiveTime,
}

impl Iterator for CandidateSlots {
    type Item = NaiveTime;

    fn next(&mut self) -> Option<NaiveTime> {
        let start = self.current?;
        let (end, wrapped) = start.overflowing_add_signed(self.duration);
        if wrapped != 0 || end > self.closing_time || end <= start {
            self.current = None;
            return None;
        }

        let (next, wrapped) = start.overflowing_add_signed(self.step);
        self.current = if wrapped != 0 { None } else { Some(next) };
        Some(start)
    }
}

pub fn generate_candidates(
    duration_minutes: i32,
    opening_time: NaiveTime,
    closing_time: NaiveTime,
    step_minutes: i64,
) -> CandidateSlots {
    let runnable = duration_minutes > 0 && step_minutes > 0 && opening_time < closing_time;

    CandidateSlots {
        current: runnable.then_some(opening_time),
        duration: Duration::minutes(duration_minutes.max(0) as i64),
        step: Duration::minutes(step_minutes.max(0)),
        closing_time,
    }
}

/// Candidate intervals rather than bare start times.
pub fn candidate_intervals(
    duration_minutes: i32,
    opening_time: NaiveTime,
    closing_time: NaiveTime,
    step_minutes: i64,
) -> impl Iterator<Item = TimeInterval> {
    generate_candidates(duration_minutes, opening_time, closing_time, step_minutes)
        .filter_map(move |start| TimeInterval::starting_at(start, duration_minutes))
}
