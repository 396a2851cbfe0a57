//! Effect trait definitions for everything that touches a ledger.
//!
//! This module defines **what** the pipeline can ask of the outside world;
//! handlers define **how**. Every method is a confirmed transaction or a read:
//! when a mutating call returns `Ok`, the ledger has accepted the change.
//!
//! - [`LedgerEffects`]: distributor deployment, claims, token reads
//! - [`GovernanceAdapter`]: the DAO voting app, treated as a black box
//!
//! Implementations: `dropgate-simulator` (in-process, deterministic). RPC
//! adapters implement the same traits outside this workspace.

pub mod governance;
pub mod ledger;

pub use governance::{DaoApps, GovernanceAdapter, Payment, ProposalId, ProposalPhase, ProposalStatus};
pub use ledger::{ClaimReceipt, ClaimRequest, LedgerEffects, LedgerError};
