use crate::model::InvalidWindow;
use crate::store::StoreError;

/// Scheduling failure taxonomy. Every variant is recoverable by the caller:
/// errors come back as values for the shell to render and re-prompt on,
/// never as aborts, and none of them leaves a partially written store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Window start is not before its end.
    InvalidWindow,
    /// Booking would start before the current time on the current date.
    PastTime,
    /// An existing reservation overlaps the candidate window.
    Conflict { occupant: String },
    /// Cancel target matched nothing.
    NotFound,
    StoreUnavailable(String),
    StoreRejected(String),
}

impl std::fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleError::InvalidWindow => write!(f, "end time must be after start time"),
            ScheduleError::PastTime => write!(f, "start time has already passed today"),
            ScheduleError::Conflict { occupant } => {
                write!(f, "slot already taken by {occupant}")
            }
            ScheduleError::NotFound => write!(f, "no matching reservation"),
            ScheduleError::StoreUnavailable(e) => write!(f, "store unavailable: {e}"),
            ScheduleError::StoreRejected(e) => write!(f, "store rejected write: {e}"),
        }
    }
}

impl std::error::Error for ScheduleError {}

impl From<InvalidWindow> for ScheduleError {
    fn from(_: InvalidWindow) -> Self {
        ScheduleError::InvalidWindow
    }
}

impl From<StoreError> for ScheduleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(e) => ScheduleError::StoreUnavailable(e),
            StoreError::Rejected(e) => ScheduleError::StoreRejected(e),
        }
    }
}
