use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::model::Reservation;

use super::{ReservationStore, StoreError};

/// In-memory table for tests, benches and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<Reservation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<Reservation>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn read_all(&self) -> Result<Vec<Reservation>, StoreError> {
        Ok(self.rows.read().await.clone())
    }

    async fn replace_all(&self, rows: &[Reservation]) -> Result<(), StoreError> {
        *self.rows.write().await = rows.to_vec();
        Ok(())
    }
}
