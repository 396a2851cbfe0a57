//! Single-writer lock files.
//!
//! A lock is a sibling file created with `create_new`, so exactly one process
//! can hold it. It records the holder's pid and acquisition time and is
//! removed when the guard drops. A crashed holder leaves the file behind; it
//! must be removed by hand after checking that the pid is gone.

use crate::errors::{Result, StateError};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LockRecord {
    pid: u32,
    acquired_at: u64,
}

/// Guard for an exclusively held state file.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl StateLock {
    /// Take the lock at `path`, failing with `Locked` if another writer holds it.
    pub fn acquire(path: PathBuf) -> Result<Self> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = std::fs::read_to_string(&path)
                    .unwrap_or_else(|_| "unreadable lock file".to_string());
                return Err(StateError::Locked {
                    path,
                    holder: holder.trim().to_string(),
                });
            }
            Err(e) => return Err(StateError::io(path, e)),
        };

        // The guard owns the file from here on
        let lock = Self { path };
        let record = LockRecord {
            pid: std::process::id(),
            acquired_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        };
        let body = serde_json::to_vec(&record).map_err(|source| StateError::Parse {
            path: lock.path.clone(),
            source,
        })?;
        file.write_all(&body)
            .and_then(|()| file.sync_all())
            .map_err(|e| StateError::io(&lock.path, e))?;

        debug!(lock = %lock.path.display(), pid = record.pid, "State lock acquired");
        Ok(lock)
    }

    /// Lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(lock = %self.path.display(), "State lock released"),
            Err(e) => warn!(lock = %self.path.display(), error = %e, "Failed to remove state lock"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployed-test.json.lock");

        let first = StateLock::acquire(path.clone()).unwrap();
        let err = StateLock::acquire(path.clone()).unwrap_err();
        match err {
            StateError::Locked { holder, .. } => {
                assert!(holder.contains(&std::process::id().to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }

        drop(first);
        assert!(!path.exists());
        let _again = StateLock::acquire(path).unwrap();
    }
}
