//! # Dropgate Core - Layer 1: Foundation
//!
//! **Purpose**: Domain types and pure logic for a governance-gated Merkle airdrop.
//!
//! This crate owns everything that can be computed without touching a ledger:
//!
//! - **Entitlements**: the `(index, account, amount)` manifest and its validation
//! - **Commitment**: the binary Keccak-256 tree, per-leaf proofs and verification
//! - **Claims**: the replay-protected claim ledger bound to one commitment
//! - **Manifest**: the JSON file handed to operators and recipients
//! - **Contracts**: the static registry of contract interfaces the pipeline talks to
//! - **Effects**: trait definitions for ledger and governance side effects
//!
//! # Architecture Constraints
//!
//! - YES pure functions, deterministic outputs
//! - YES effect trait definitions (what can be done)
//! - NO effect handler implementations (those live in `dropgate-simulator` or RPC adapters)
//! - NO persisted coordination state (that is `dropgate-store`)

#![forbid(unsafe_code)]

/// Claim ledger with claimed-index bitmap
pub mod claims;

/// Merkle commitment over an entitlement set
pub mod commitment;

/// Static contract interface registry
pub mod contracts;

/// Hashing and low-level tree construction
pub mod crypto;

/// Ledger and governance effect traits
pub mod effects;

/// Entitlements and entitlement sets
pub mod entitlement;

/// Domain error types
pub mod errors;

/// Manifest file codec
pub mod manifest;

/// Addresses, digests and amounts
pub mod types;

pub use claims::{ClaimLedger, ClaimStatus};
pub use commitment::{build, leaf_digest, verify, Commitment, CommitmentBuild, Proof};
pub use contracts::{ContractHandle, ContractInterface, ContractKind};
pub use effects::{
    ClaimReceipt, ClaimRequest, DaoApps, GovernanceAdapter, LedgerEffects, LedgerError, Payment,
    ProposalId, ProposalPhase, ProposalStatus,
};
pub use entitlement::{Entitlement, EntitlementSet};
pub use errors::{ClaimError, EntitlementError};
pub use manifest::{ManifestClaim, ManifestError, MerkleManifest, VerifiedManifest};
pub use types::{Address, Amount, Digest, HexError};
