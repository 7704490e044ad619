use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::model::Reservation;

use super::{ReservationStore, StoreError};

/// Single-file JSON table.
///
/// The entire reservation set lives in one JSON array — the file *is* the
/// table, and every mutation rewrites it. `replace_all` writes a temp file,
/// fsyncs, and renames it over the table so a crash mid-write never leaves a
/// half-written file behind for readers.
pub struct TableFileStore {
    path: PathBuf,
}

impl TableFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_sync(path: &Path) -> Result<Vec<Reservation>, StoreError> {
        let file = match File::open(path) {
            Ok(f) => f,
            // No table yet reads as an empty schedule.
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Unavailable(e.to_string())),
        };
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| StoreError::Unavailable(format!("unreadable table: {e}")))
    }

    fn write_sync(path: &Path, rows: &[Reservation]) -> Result<(), StoreError> {
        let tmp = path.with_extension("json.tmp");
        let result = (|| -> io::Result<()> {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, rows).map_err(io::Error::other)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            fs::rename(&tmp, path)
        })();
        result.map_err(|e| StoreError::Rejected(e.to_string()))
    }
}

#[async_trait]
impl ReservationStore for TableFileStore {
    async fn read_all(&self) -> Result<Vec<Reservation>, StoreError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Self::read_sync(&path))
            .await
            .map_err(|e| StoreError::Unavailable(format!("store task died: {e}")))?
    }

    async fn replace_all(&self, rows: &[Reservation]) -> Result<(), StoreError> {
        let path = self.path.clone();
        let rows = rows.to_vec();
        tokio::task::spawn_blocking(move || Self::write_sync(&path, &rows))
            .await
            .map_err(|e| StoreError::Rejected(format!("store task died: {e}")))?
    }
}
