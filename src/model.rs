use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Half-open wall-clock interval `[start, end)` on a single calendar date.
///
/// Comparison is always on the structured `chrono` values. The system this
/// replaces compared zero-padded `"HH:MM"` strings, which only works while
/// every producer pads consistently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Rejected window construction: `start >= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidWindow;

impl TimeWindow {
    pub fn new(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Result<Self, InvalidWindow> {
        if start >= end {
            return Err(InvalidWindow);
        }
        Ok(Self { date, start, end })
    }

    /// Half-open overlap test. Windows on different dates never overlap;
    /// neither do touching windows (one ends exactly when the other starts).
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.date == other.date && self.start < other.end && other.start < self.end
    }
}

/// A reservation row — the store's sole entity.
///
/// `id` is minted at creation and is not part of the legacy identity key;
/// it exists so cancellation has an unambiguous handle (see [`CancelKey`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub equipment: String,
    #[serde(flatten)]
    pub window: TimeWindow,
    pub user: String,
}

impl Reservation {
    /// Build a candidate row with a freshly minted id.
    pub fn new(equipment: impl Into<String>, window: TimeWindow, user: impl Into<String>) -> Self {
        Self {
            id: Ulid::new(),
            equipment: equipment.into(),
            window,
            user: user.into(),
        }
    }
}

/// What the input surface yields: an unvalidated candidate tuple.
///
/// The engine owns the window and past-time checks; the shell only vouches
/// for field presence and catalog membership before handing this over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub user: String,
    pub equipment: String,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// The operational identity of a reservation: `(user, equipment, date, start)`.
///
/// The store enforces no uniqueness on this tuple, so a key can match more
/// than one row; cancellation by key removes every match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelKey {
    pub user: String,
    pub equipment: String,
    pub date: NaiveDate,
    pub start: NaiveTime,
}

impl CancelKey {
    pub fn matches(&self, row: &Reservation) -> bool {
        row.user == self.user
            && row.equipment == self.equipment
            && row.window.date == self.date
            && row.window.start == self.start
    }
}

/// Broadcast on the notify hub, keyed by equipment name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleEvent {
    Booked { reservation: Reservation },
    Cancelled { key: CancelKey, removed: usize },
}

impl ScheduleEvent {
    /// The equipment whose channel this event belongs on.
    pub fn equipment(&self) -> &str {
        match self {
            ScheduleEvent::Booked { reservation } => &reservation.equipment,
            ScheduleEvent::Cancelled { key, .. } => &key.equipment,
        }
    }
}
