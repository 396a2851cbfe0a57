//! Unified error type for state access.

use std::path::PathBuf;

/// Errors raised by the state store.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Keys a stage depends on are absent. Lists every missing key, in the
    /// order the caller asked for them.
    #[error("missing state: {}", keys.join(", "))]
    MissingState {
        /// Absent dotted key paths
        keys: Vec<String>,
    },

    /// Filesystem failure
    #[error("state I/O failed for {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Record is not valid JSON
    #[error("failed to parse state file {path}: {source}")]
    Parse {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Record parsed but is not a JSON object
    #[error("state file {path} does not contain a JSON object")]
    NotAnObject {
        /// File involved
        path: PathBuf,
    },

    /// Record belongs to a different chain
    #[error("state file {path} is for chain {found}, expected chain {expected}")]
    ChainIdMismatch {
        /// File involved
        path: PathBuf,
        /// Chain id the caller is connected to
        expected: u64,
        /// Chain id recorded in the file
        found: u64,
    },

    /// Malformed dotted key path
    #[error("invalid key path {path:?}: {reason}")]
    InvalidKeyPath {
        /// The path as given
        path: String,
        /// What is wrong with it
        reason: String,
    },

    /// Key is present but holds the wrong kind of value
    #[error("invalid value at {key}: {reason}")]
    InvalidValue {
        /// Dotted key path
        key: String,
        /// What is wrong with it
        reason: String,
    },

    /// Network name cannot be used in a file name
    #[error("invalid network name {name:?}")]
    InvalidNetwork {
        /// The name as given
        name: String,
    },

    /// Another writer holds the lock
    #[error("state is locked by another writer: {path} ({holder})")]
    Locked {
        /// Lock file
        path: PathBuf,
        /// Lock file contents, if readable
        holder: String,
    },
}

impl StateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Keys reported by a `MissingState` error.
    pub fn missing_keys(&self) -> &[String] {
        match self {
            Self::MissingState { keys } => keys,
            _ => &[],
        }
    }
}

/// Result alias for state operations.
pub type Result<T> = std::result::Result<T, StateError>;
