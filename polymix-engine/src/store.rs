//! Durable storage for ledger snapshots.

use crate::ledger::LedgerSnapshot;
use parking_lot::Mutex;
use std::{
    fs::{self, File},
    io::{BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};
use thiserror::Error;

/// Errors that can occur when loading or saving a snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ledger file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger snapshot is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Keyed storage for the single ledger snapshot.
pub trait LedgerStore: Send + Sync {
    /// Load the last saved snapshot, `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<LedgerSnapshot>, StoreError>;

    /// Replace the stored snapshot.
    fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), StoreError>;
}

/// Stores the snapshot as pretty-printed JSON in a single file.
///
/// Writes go to a sibling temp file which is synced and renamed over the
/// target, so a crash never leaves a half-written ledger behind.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl LedgerStore for JsonFileStore {
    fn load(&self) -> Result<Option<LedgerSnapshot>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
        let temp = self.temp_path();

        let file = File::create(&temp)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, snapshot)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

/// In-memory store, useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<LedgerSnapshot>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `snapshot`.
    pub fn with_snapshot(snapshot: LedgerSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            saves: AtomicUsize::new(0),
        }
    }

    /// Last saved snapshot.
    pub fn saved(&self) -> Option<LedgerSnapshot> {
        self.snapshot.lock().clone()
    }

    /// Number of completed saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }
}

impl LedgerStore for MemoryStore {
    fn load(&self) -> Result<Option<LedgerSnapshot>, StoreError> {
        Ok(self.snapshot.lock().clone())
    }

    fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
        *self.snapshot.lock() = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl<S> LedgerStore for std::sync::Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn load(&self) -> Result<Option<LedgerSnapshot>, StoreError> {
        (**self).load()
    }

    fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
        (**self).save(snapshot)
    }
}
