use chrono::NaiveDateTime;
use tracing::info;
use ulid::Ulid;

use crate::model::{BookingRequest, CancelKey, Reservation, ScheduleEvent};

use super::conflict::{find_conflict, validate_request};
use super::{ScheduleError, Scheduler};

impl Scheduler {
    /// Book against the current moment on the lab clock.
    pub async fn book(&self, request: BookingRequest) -> Result<Reservation, ScheduleError> {
        let now = self.local_now();
        self.book_at(request, now).await
    }

    /// Validate → check-conflict → commit, with the current moment injected.
    ///
    /// Validation and conflict checking complete fully before any write is
    /// attempted; a write failure means the candidate was not committed.
    pub async fn book_at(
        &self,
        request: BookingRequest,
        now: NaiveDateTime,
    ) -> Result<Reservation, ScheduleError> {
        let window = validate_request(&request, now)?;
        let candidate = Reservation::new(request.equipment, window, request.user);

        let _writer = self.write_lock.lock().await;
        let mut rows = self.read_table().await?;
        if let Some(hit) = find_conflict(&candidate, &rows) {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(ScheduleError::Conflict {
                occupant: hit.user.clone(),
            });
        }

        rows.push(candidate.clone());
        self.write_table(&rows).await?;

        metrics::counter!(crate::observability::BOOKINGS_TOTAL).increment(1);
        info!(
            equipment = %candidate.equipment,
            user = %candidate.user,
            date = %candidate.window.date,
            "booked"
        );
        self.notify.send(&ScheduleEvent::Booked {
            reservation: candidate.clone(),
        });
        Ok(candidate)
    }

    /// Remove every row matching the legacy identity key.
    ///
    /// The key tuple is not unique in the store; when it matches several rows
    /// they are all removed. That mirrors the system this replaces; use
    /// [`Scheduler::cancel_by_id`] for a one-row guarantee.
    pub async fn cancel(&self, key: &CancelKey) -> Result<(), ScheduleError> {
        let _writer = self.write_lock.lock().await;
        let rows = self.read_table().await?;

        let remaining: Vec<Reservation> =
            rows.iter().filter(|row| !key.matches(row)).cloned().collect();
        let removed = rows.len() - remaining.len();
        if removed == 0 {
            return Err(ScheduleError::NotFound);
        }

        self.write_table(&remaining).await?;

        metrics::counter!(crate::observability::CANCELLATIONS_TOTAL).increment(removed as u64);
        info!(user = %key.user, equipment = %key.equipment, removed, "cancelled");
        self.notify.send(&ScheduleEvent::Cancelled {
            key: key.clone(),
            removed,
        });
        Ok(())
    }

    /// Unambiguous cancellation by generated id. Removes exactly one row.
    pub async fn cancel_by_id(&self, id: Ulid) -> Result<Reservation, ScheduleError> {
        let _writer = self.write_lock.lock().await;
        let mut rows = self.read_table().await?;

        let pos = rows
            .iter()
            .position(|row| row.id == id)
            .ok_or(ScheduleError::NotFound)?;
        let removed = rows.remove(pos);

        self.write_table(&rows).await?;

        metrics::counter!(crate::observability::CANCELLATIONS_TOTAL).increment(1);
        info!(user = %removed.user, equipment = %removed.equipment, %id, "cancelled");
        self.notify.send(&ScheduleEvent::Cancelled {
            key: CancelKey {
                user: removed.user.clone(),
                equipment: removed.equipment.clone(),
                date: removed.window.date,
                start: removed.window.start,
            },
            removed: 1,
        });
        Ok(removed)
    }
}
