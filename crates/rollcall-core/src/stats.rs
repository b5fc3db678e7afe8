//! Attendance percentage arithmetic.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::types::AttendanceEvent;

/// Derived attendance figures for one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttendanceFigures {
    pub total_present_days: u32,
    /// Distinct present days over the span since first attendance, in
    /// [0, 100].
    pub percentage: u8,
}

/// Percentage of distinct present days over the inclusive span from the
/// first-ever attendance date of `name` to `as_of`.
///
/// Events for other identities are ignored, so callers may pass an
/// unfiltered slice. The result is clamped to 100: `as_of` landing before
/// the newest event's date (clock skew across a timezone boundary) must not
/// push the ratio past full attendance.
pub fn compute_percentage(
    name: &str,
    events: &[AttendanceEvent],
    as_of: NaiveDate,
) -> AttendanceFigures {
    let unique_dates: BTreeSet<NaiveDate> = events
        .iter()
        .filter(|e| e.name == name)
        .map(|e| e.date)
        .collect();

    let Some(&first) = unique_dates.first() else {
        return AttendanceFigures {
            total_present_days: 0,
            percentage: 0,
        };
    };

    let total_days = ((as_of - first).num_days() + 1).max(1) as u64;
    let present = unique_dates.len() as u64;
    let percentage = ((present as f64 / total_days as f64) * 100.0).round() as u64;

    AttendanceFigures {
        total_present_days: present as u32,
        percentage: percentage.min(100) as u8,
    }
}
