use chrono::NaiveDate;

use crate::model::Reservation;

use super::{ScheduleError, Scheduler};

/// Upcoming view: rows on or after the reference date, ordered ascending by
/// `(date, start)`. Purely a projection: idempotent, and it never touches
/// the store. The sort is stable, so rows that share a start keep store order.
pub fn upcoming_view(mut rows: Vec<Reservation>, reference: NaiveDate) -> Vec<Reservation> {
    rows.retain(|row| row.window.date >= reference);
    rows.sort_by_key(|row| (row.window.date, row.window.start));
    rows
}

/// The rows a user may be offered for cancellation: their own, today or
/// later, in schedule order.
pub fn cancellable_view(
    rows: Vec<Reservation>,
    user: &str,
    today: NaiveDate,
) -> Vec<Reservation> {
    let mine: Vec<Reservation> = rows
        .into_iter()
        .filter(|row| row.user == user)
        .collect();
    upcoming_view(mine, today)
}

impl Scheduler {
    /// Full schedule from `reference` on.
    pub async fn upcoming_from(
        &self,
        reference: NaiveDate,
    ) -> Result<Vec<Reservation>, ScheduleError> {
        Ok(upcoming_view(self.read_table().await?, reference))
    }

    /// Full schedule from today on the lab clock.
    pub async fn upcoming(&self) -> Result<Vec<Reservation>, ScheduleError> {
        self.upcoming_from(self.local_today()).await
    }

    /// What `user` could cancel right now.
    pub async fn cancellable(&self, user: &str) -> Result<Vec<Reservation>, ScheduleError> {
        Ok(cancellable_view(
            self.read_table().await?,
            user,
            self.local_today(),
        ))
    }
}
