//! File-backed network state store.

use crate::errors::{Result, StateError};
use crate::lock::StateLock;
use crate::state::NetworkState;
use serde_json::Value;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Reads and writes `deployed-<network>.json` records in one directory.
#[derive(Debug, Clone)]
pub struct NetworkStateStore {
    dir: PathBuf,
}

impl NetworkStateStore {
    /// Store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// State directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `network`.
    pub fn state_path(&self, network: &str) -> Result<PathBuf> {
        validate_network(network)?;
        Ok(self.dir.join(format!("deployed-{network}.json")))
    }

    /// Path of the lock file for `network`.
    pub fn lock_path(&self, network: &str) -> Result<PathBuf> {
        validate_network(network)?;
        Ok(self.dir.join(format!("deployed-{network}.json.lock")))
    }

    /// Load the record for `(network, chain_id)`.
    ///
    /// A missing file yields an empty record. A file recorded for a different
    /// chain id fails with `ChainIdMismatch`.
    pub fn read(&self, network: &str, chain_id: u64) -> Result<NetworkState> {
        let path = self.state_path(network)?;
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(network, chain_id, path = %path.display(), "No state recorded yet");
                return Ok(NetworkState::new());
            }
            Err(e) => return Err(StateError::io(path, e)),
        };

        let value: Value = serde_json::from_str(&text).map_err(|source| StateError::Parse {
            path: path.clone(),
            source,
        })?;
        let Value::Object(map) = value else {
            return Err(StateError::NotAnObject { path });
        };
        let state = NetworkState::from_map(map);

        if let Some(found) = state.network_id() {
            if found != chain_id {
                return Err(StateError::ChainIdMismatch {
                    path,
                    expected: chain_id,
                    found,
                });
            }
        }

        debug!(network, chain_id, keys = state.as_map().len(), "State loaded");
        Ok(state)
    }

    /// Overwrite the record for `(network, chain_id)` with `state`.
    ///
    /// The record is written to a uniquely named temporary sibling, flushed,
    /// and renamed over the target. The temporary file is removed on failure.
    pub fn persist(&self, network: &str, chain_id: u64, state: &NetworkState) -> Result<()> {
        let path = self.state_path(network)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| StateError::io(&self.dir, e))?;

        let mut record = state.clone();
        record.set_network_id(chain_id);
        let mut body = record.to_json_pretty();
        body.push('\n');

        let mut temp =
            NamedTempFile::new_in(&self.dir).map_err(|e| StateError::io(&self.dir, e))?;
        temp.as_file_mut()
            .write_all(body.as_bytes())
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| StateError::io(temp.path(), e))?;
        temp.persist(&path)
            .map_err(|e| StateError::io(&path, e.error))?;

        info!(network, chain_id, path = %path.display(), "State persisted");
        Ok(())
    }

    /// Take the single-writer lock for `network`.
    pub fn lock(&self, network: &str) -> Result<StateLock> {
        let path = self.lock_path(network)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| StateError::io(&self.dir, e))?;
        StateLock::acquire(path)
    }

    /// Lock, read, apply `update`, and persist.
    pub fn update<F>(&self, network: &str, chain_id: u64, update: F) -> Result<NetworkState>
    where
        F: FnOnce(&mut NetworkState) -> Result<()>,
    {
        let _lock = self.lock(network)?;
        let mut state = self.read(network, chain_id)?;
        update(&mut state)?;
        self.persist(network, chain_id, &state)?;
        Ok(state)
    }
}

fn validate_network(network: &str) -> Result<()> {
    let valid = !network.is_empty()
        && network
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StateError::InvalidNetwork {
            name: network.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_names() {
        let store = NetworkStateStore::new("/tmp/state");
        assert!(store.state_path("rinkeby").is_ok());
        assert!(store.state_path("local_dev-2").is_ok());
        assert!(matches!(
            store.state_path("../etc"),
            Err(StateError::InvalidNetwork { .. })
        ));
        assert!(store.state_path("").is_err());
    }

    #[test]
    fn test_state_file_name() {
        let store = NetworkStateStore::new("/srv/state");
        assert_eq!(
            store.state_path("mainnet").unwrap(),
            PathBuf::from("/srv/state/deployed-mainnet.json")
        );
    }
}
