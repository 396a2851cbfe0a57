//! # Dropgate Store - Layer 2: Coordination State
//!
//! **Purpose**: Durable record of what has already happened on each network.
//!
//! Every pipeline stage reads the record for its network, checks that the keys
//! it depends on are present, performs its effect, and writes the whole record
//! back. The record is the only thing that survives between operator runs.
//!
//! # Architecture Constraints
//!
//! **Layer 2 depends only on dropgate-core** (foundation).
//! - YES JSON record per network, keyed by network name and chain id
//! - YES dotted key paths into nested records
//! - YES single-writer lock files and atomic replacement
//! - NO ledger access (that is `dropgate-pipeline`)
//!
//! ## On-disk layout
//!
//! ```text
//! <state_dir>/deployed-<network>.json        the record
//! <state_dir>/deployed-<network>.json.lock   held while a stage runs
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Error types for state access
pub mod errors;

/// Single-writer lock files
pub mod lock;

/// The in-memory record and dotted key paths
pub mod state;

/// File-backed store
pub mod store;

pub use errors::{Result, StateError};
pub use lock::StateLock;
pub use state::{assert_required, KeyPath, NetworkState, NETWORK_ID_KEY};
pub use store::NetworkStateStore;
