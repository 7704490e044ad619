use chrono::NaiveDateTime;

use crate::model::{BookingRequest, Reservation, TimeWindow};

use super::ScheduleError;

/// First existing reservation that collides with the candidate, if any.
///
/// Only rows for the same equipment on the same date are considered, under
/// the half-open overlap test (touching windows never conflict). Ties report
/// the first hit in the collection's own order; callers wanting a
/// deterministic occupant should sort the input by start time first.
///
/// Pure function of its inputs.
pub fn find_conflict<'a>(
    candidate: &Reservation,
    existing: &'a [Reservation],
) -> Option<&'a Reservation> {
    existing
        .iter()
        .find(|row| row.equipment == candidate.equipment && row.window.overlaps(&candidate.window))
}

/// Pre-commit validation, short-circuit, first failure wins.
///
/// The past-time check runs first and only applies when the candidate is for
/// today: future dates are never held against the current time of day. The
/// legacy form validated in this order, so a malformed window starting in
/// the past still reports `PastTime`.
pub(super) fn validate_request(
    request: &BookingRequest,
    now: NaiveDateTime,
) -> Result<TimeWindow, ScheduleError> {
    if request.date == now.date() && request.start < now.time() {
        return Err(ScheduleError::PastTime);
    }
    Ok(TimeWindow::new(request.date, request.start, request.end)?)
}
