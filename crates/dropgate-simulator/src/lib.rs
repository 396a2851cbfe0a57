//! Dropgate Simulator
//!
//! A deterministic, in-process ledger implementing [`LedgerEffects`] and
//! [`GovernanceAdapter`]. It models what the pipeline observes and nothing
//! more:
//!
//! - ERC20 balances and total supply
//! - distributors bound to `(token, root)` that pay out verified claims
//! - a DAO (token manager, finance, voting) whose approved payments move
//!   tokens out of a vault
//! - a simulated clock for vote windows
//!
//! Transactions execute one at a time under a single lock, the way a ledger
//! orders them. A configurable latency delays every call, which lets tests
//! exercise caller-side timeouts.
//!
//! [`LedgerEffects`]: dropgate_core::LedgerEffects
//! [`GovernanceAdapter`]: dropgate_core::GovernanceAdapter

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// The simulated chain and its effect trait implementations
pub mod chain;

/// Contract and account state held by the chain
pub mod state;

/// Pure vote tallying rules
pub mod tally;

pub use chain::{DaoDeployment, SimulatedChain};
pub use tally::{VoteRecord, VotingSettings, PCT_BASE};
