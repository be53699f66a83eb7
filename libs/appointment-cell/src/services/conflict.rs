// libs/appointment-cell/src/services/conflict.rs
use tracing::debug;

use crate::models::TimeInterval;

/// Two intervals conflict if `a.start < b.end AND b.start < a.end`.
/// Back-to-back intervals (one ends exactly when the other starts) do not.
pub fn overlaps(a: &TimeInterval, b: &TimeInterval) -> bool {
    a.start < b.end && b.start < a.end
}

/// True iff `candidate` overlaps none of `existing`.
pub fn is_available<'a, I>(candidate: &TimeInterval, existing: I) -> bool
where
    I: IntoIterator<Item = &'a TimeInterval>,
{
    existing.into_iter().all(|booked| !overlaps(candidate, booked))
}

/// The members of `existing` that `candidate` collides with.
pub fn find_conflicts<'a, I>(candidate: &TimeInterval, existing: I) -> Vec<TimeInterval>
where
    I: IntoIterator<Item = &'a TimeInterval>,
{
    let conflicts: Vec<TimeInterval> = existing.into_iter()
        .filter(|booked| overlaps(candidate, booked))
        .copied()
        .collect();

    if !conflicts.is_empty() {
        debug!("Interval {} conflicts with {} booked interval(s)", candidate, conflicts.len());
    }

    conflicts
}
