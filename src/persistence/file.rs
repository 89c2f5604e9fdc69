//! JSON file store.
//!
//! Values live in memory and are written out as a versioned JSON envelope
//! on [`flush`](PersistenceGateway::flush). Writes go to a temp file that is
//! renamed over the save, so a crash mid-write never leaves a torn file.
//! Flushes are serialized, so two of them never share the temp file.
//! A save that cannot be read or parsed never stops the game: the store
//! starts empty and the problem is logged.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};

use super::memory::{MemoryStore, StoredValue};
use super::{PersistenceError, PersistenceGateway};

/// Current envelope version.
pub const SAVE_VERSION: u32 = 1;

/// On-disk layout.
#[derive(Debug, Serialize, Deserialize)]
struct SaveEnvelope {
    version: u32,
    saved_at: DateTime<Utc>,
    values: BTreeMap<String, StoredValue>,
}

/// Key-value store persisted to a JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: MemoryStore,
    dirty: AtomicBool,
    flush_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading any existing save.
    ///
    /// A missing file is an empty store. A corrupt file is renamed to
    /// `<path>.corrupt`. Any other failure is logged and the store starts
    /// empty; the next flush will try to write the file again.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<SaveEnvelope>(&text) {
                Ok(envelope) => {
                    if envelope.version != SAVE_VERSION {
                        warn!(
                            version = envelope.version,
                            expected = SAVE_VERSION,
                            "Save version differs, loading values as-is"
                        );
                    }
                    info!(path = %path.display(), keys = envelope.values.len(), "Loaded save");
                    envelope.values
                }
                Err(e) => {
                    let aside = corrupt_path(&path);
                    warn!(error = %e, moved_to = %aside.display(), "Save is corrupt, starting fresh");
                    if let Err(e) = fs::rename(&path, &aside) {
                        warn!(error = %e, path = %path.display(), "Could not move corrupt save aside");
                    }
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No save found, starting fresh");
                BTreeMap::new()
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Save unreadable, starting fresh");
                BTreeMap::new()
            }
        };

        Self {
            path,
            values: MemoryStore::with_values(values),
            dirty: AtomicBool::new(false),
            flush_lock: Mutex::new(()),
        }
    }

    /// Location of the save file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Are there writes not yet flushed?
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn mark_dirty<T>(&self, result: Result<T, PersistenceError>) -> Result<T, PersistenceError> {
        if result.is_ok() {
            self.dirty.store(true, Ordering::SeqCst);
        }
        result
    }
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".corrupt");
    PathBuf::from(name)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

impl PersistenceGateway for JsonFileStore {
    fn get_int(&self, key: &str, default: i64) -> Result<i64, PersistenceError> {
        self.values.get_int(key, default)
    }

    fn set_int(&self, key: &str, value: i64) -> Result<(), PersistenceError> {
        self.mark_dirty(self.values.set_int(key, value))
    }

    fn get_string(&self, key: &str, default: &str) -> Result<String, PersistenceError> {
        self.values.get_string(key, default)
    }

    fn set_string(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.mark_dirty(self.values.set_string(key, value))
    }

    fn get_string_set(
        &self,
        key: &str,
        default: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, PersistenceError> {
        self.values.get_string_set(key, default)
    }

    fn set_string_set(&self, key: &str, value: &BTreeSet<String>) -> Result<(), PersistenceError> {
        self.mark_dirty(self.values.set_string_set(key, value))
    }

    fn flush(&self) -> Result<(), PersistenceError> {
        // Held until the rename lands
        let _flushing = self.flush_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let write = || -> Result<(), PersistenceError> {
            let envelope = SaveEnvelope {
                version: SAVE_VERSION,
                saved_at: Utc::now(),
                values: self.values.snapshot()?,
            };
            let json = serde_json::to_string_pretty(&envelope)?;
            let tmp = temp_path(&self.path);
            fs::write(&tmp, json)?;
            fs::rename(&tmp, &self.path)?;
            Ok(())
        };

        if let Err(e) = write() {
            // Keep the data pending for the next flush
            self.dirty.store(true, Ordering::SeqCst);
            return Err(e);
        }

        debug!(path = %self.path.display(), "Save flushed");
        Ok(())
    }
}
