//! # Dropgate Pipeline - Layer 3: Coordination
//!
//! **Purpose**: Sequence the operator-run stages of a governance-gated airdrop
//! against the durable network record.
//!
//! ```text
//! Deploy ──▶ Propose ──▶ Vote ──▶ Execute ──▶ Claim
//!   │           │                                 │
//!   └─ distributor address     proposal id ◀──────┘ reads both
//! ```
//!
//! Each stage is an async function over an explicit [`StageContext`]:
//!
//! 1. take the network's state lock
//! 2. read the record and assert the keys the stage depends on
//! 3. perform its ledger or governance calls, each bounded by the network timeout
//! 4. persist what it learned, only after the ledger confirmed it
//!
//! A crash or timeout before step 4 leaves the record unchanged, so every
//! stage can be rerun. Deploy and Propose detect their own earlier success and
//! do nothing the second time.
//!
//! # Architecture Constraints
//!
//! **Layer 3 depends on dropgate-core and dropgate-store.**
//! - YES stage sequencing, timeouts, state key layout
//! - NO ledger implementations (tests use `dropgate-simulator`)
//! - NO process exit codes (that is the CLI)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Pipeline configuration
pub mod config;

/// Explicit per-run context
pub mod context;

/// Stage error type
pub mod errors;

/// State key layout
pub mod keys;

/// Supply share arithmetic
pub mod math;

/// The five stages
pub mod stages;

pub use config::{ConfigError, NetworkConfig, PipelineConfig, VoterConfig};
pub use context::StageContext;
pub use errors::{Result, StageError};
pub use stages::{
    claim::{claim, claim_all, ClaimSummary},
    deploy::{deploy, DeployOutcome},
    execute::{execute, ExecuteOutcome},
    propose::{propose, ProposeOutcome},
    vote::{vote, VoteSummary},
    Stage,
};
