mod memory;
mod table_file;

pub use memory::MemoryStore;
pub use table_file::TableFileStore;

use async_trait::async_trait;

use crate::model::Reservation;

/// Failure at the store boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or read.
    Unavailable(String),
    /// The store refused a write; nothing was committed.
    Rejected(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(e) => write!(f, "store unavailable: {e}"),
            StoreError::Rejected(e) => write!(f, "store rejected write: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Durable tabular home of the reservation set.
///
/// The contract is whole-collection read and whole-collection overwrite:
/// every mutation submits the complete desired final set. No partial update
/// and no compare-and-swap — serializing writers is the caller's problem
/// (the engine holds a single-writer lock per store instance).
#[async_trait]
pub trait ReservationStore: Send + Sync + 'static {
    async fn read_all(&self) -> Result<Vec<Reservation>, StoreError>;
    async fn replace_all(&self, rows: &[Reservation]) -> Result<(), StoreError>;
}
