//! Durable tap counter
//!
//! The counter lives in memory behind a mutex and on disk as `{"count": n}`.
//! Every increment holds the lock across read, write and persist, and memory is
//! only updated once the file has been durably replaced.

pub mod atomic;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::types::{Result, StorageError};

/// On-disk record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    pub count: u64,
}

/// CounterStore owns the counter file and the in-memory value
pub struct CounterStore {
    path: PathBuf,
    count: Mutex<u64>,
}

impl CounterStore {
    /// Open the counter at `path`, creating it with a count of 0 if absent
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let count = match std::fs::read(&path) {
            Ok(bytes) => {
                let record: CounterRecord =
                    serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    })?;
                info!(path = %path.display(), count = record.count, "Loaded counter");
                record.count
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|source| {
                        StorageError::WriteFailed {
                            path: parent.display().to_string(),
                            source,
                        }
                    })?;
                }
                persist(&path, 0)?;
                info!(path = %path.display(), "Created counter file");
                0
            }
            Err(source) => {
                return Err(StorageError::ReadFailed {
                    path: path.display().to_string(),
                    source,
                }
                .into())
            }
        };

        Ok(Self {
            path,
            count: Mutex::new(count),
        })
    }

    /// Add one to the counter and return the new value
    pub fn increment(&self) -> Result<u64> {
        let mut count = self.count.lock();

        let next = count
            .checked_add(1)
            .ok_or(StorageError::Overflow { value: *count })?;

        if let Err(e) = persist(&self.path, next) {
            error!(
                path = %self.path.display(),
                error = %e,
                "Failed to persist counter, increment discarded"
            );
            return Err(e.into());
        }

        *count = next;
        debug!(count = next, "Counter incremented");
        Ok(next)
    }

    /// Current value
    pub fn read(&self) -> u64 {
        *self.count.lock()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn persist(path: &Path, count: u64) -> std::result::Result<(), StorageError> {
    let body = serde_json::to_vec(&CounterRecord { count }).map_err(|e| StorageError::Corrupt {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    atomic::write_atomic(path, &body).map_err(|source| StorageError::WriteFailed {
        path: path.display().to_string(),
        source,
    })
}
