mod conflict;
mod error;
mod mutations;
mod queries;

pub use conflict::find_conflict;
pub use error::ScheduleError;
pub use queries::{cancellable_view, upcoming_view};

use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Utc};
use tokio::sync::Mutex;

use crate::model::Reservation;
use crate::notify::NotifyHub;
use crate::store::ReservationStore;

/// Orchestrates validate → check-conflict → commit over the shared table.
///
/// The store contract is whole-table read-modify-write with no
/// compare-and-swap, so every mutation here holds `write_lock` for its full
/// read-check-write cycle: at most one is in flight per `Scheduler`. That
/// closes the race within one process only. Two *processes* sharing a store
/// can still clobber each other; closing that would need a conditional
/// write (version token) from the adapter. Known deployment gap.
pub struct Scheduler {
    store: Arc<dyn ReservationStore>,
    notify: Arc<NotifyHub>,
    write_lock: Mutex<()>,
    /// The lab's reference UTC offset. "Today" means today on this clock.
    offset: FixedOffset,
    store_timeout: Duration,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        notify: Arc<NotifyHub>,
        offset: FixedOffset,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            notify,
            write_lock: Mutex::new(()),
            offset,
            store_timeout,
        }
    }

    /// Current wall-clock moment on the lab's reference clock.
    pub fn local_now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }

    pub fn local_today(&self) -> NaiveDate {
        self.local_now().date()
    }

    /// Store read with the adapter timeout applied. Store calls are the only
    /// suspension points in any engine operation.
    async fn read_table(&self) -> Result<Vec<Reservation>, ScheduleError> {
        match tokio::time::timeout(self.store_timeout, self.store.read_all()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ScheduleError::StoreUnavailable("read timed out".into())),
        }
    }

    async fn write_table(&self, rows: &[Reservation]) -> Result<(), ScheduleError> {
        match tokio::time::timeout(self.store_timeout, self.store.replace_all(rows)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ScheduleError::StoreUnavailable("write timed out".into())),
        }
    }
}
