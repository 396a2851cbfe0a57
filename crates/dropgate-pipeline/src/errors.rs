//! Stage errors.
//!
//! Every failure a stage can report, with enough context to act on it. Most are
//! fatal to a run; [`StageError::is_fatal`] singles out the ones an operator may
//! retry later or skip.

use crate::config::ConfigError;
use dropgate_core::{
    Address, Amount, ClaimError, Digest, LedgerError, ManifestError, ProposalId,
};
use dropgate_store::StateError;

/// Result alias for stage operations.
pub type Result<T> = std::result::Result<T, StageError>;

/// Failure of one pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Configuration is unusable
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// State record missing keys, unreadable, or locked
    #[error(transparent)]
    State(#[from] StateError),

    /// Manifest unreadable or inconsistent
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// A ledger or governance call failed
    #[error("{operation} failed: {source}")]
    Ledger {
        /// Call that failed
        operation: &'static str,
        /// Handler error
        #[source]
        source: LedgerError,
    },

    /// A ledger call did not answer in time
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// Call that timed out
        operation: &'static str,
        /// Configured bound
        timeout_ms: u64,
    },

    /// Connected to a different chain than configured
    #[error("network {network} expects chain {expected}, ledger reports {actual}")]
    ChainMismatch {
        /// Configured network
        network: String,
        /// Configured chain id
        expected: u64,
        /// Chain id reported by the ledger
        actual: u64,
    },

    /// Recorded distributor does not match the manifest and redeploy was not forced
    #[error("recorded distributor {address} does not match the manifest; set force_redeploy to replace it")]
    DistributorExists {
        /// Recorded address
        address: Address,
    },

    /// Distributor on the ledger commits to another root
    #[error("distributor {distributor} commits to {found}, manifest root is {expected}")]
    DistributorRootMismatch {
        /// Distributor address
        distributor: Address,
        /// Manifest root
        expected: Digest,
        /// Root the distributor holds
        found: Digest,
    },

    /// Token has no supply, so no share can be computed
    #[error("token {token} has zero total supply")]
    ZeroSupply {
        /// Token address
        token: Address,
    },

    /// Proposal cannot be executed yet
    #[error("proposal {proposal} cannot be executed")]
    NotExecutable {
        /// Proposal
        proposal: ProposalId,
    },

    /// Proposal was executed before
    #[error("proposal {proposal} was already executed")]
    AlreadyExecuted {
        /// Proposal
        proposal: ProposalId,
    },

    /// Proposal would pay someone other than the distributor, or the wrong amount
    #[error(
        "proposal {proposal} pays {amount} to {recipient}, expected {expected_amount} to {expected_recipient}"
    )]
    PaymentMismatch {
        /// Proposal
        proposal: ProposalId,
        /// Recorded distributor
        expected_recipient: Address,
        /// Manifest total
        expected_amount: Amount,
        /// Receiver in the proposal
        recipient: Address,
        /// Amount in the proposal
        amount: Amount,
    },

    /// Distributor holds less than the manifest total after funding
    #[error("distributor {distributor} holds {actual}, manifest requires {expected}")]
    UnderfundedDistributor {
        /// Distributor address
        distributor: Address,
        /// Manifest total
        expected: Amount,
        /// Balance observed
        actual: Amount,
    },

    /// Account has no entitlement in the manifest
    #[error("{account} has no entitlement in this airdrop")]
    NoEntitlement {
        /// Account asked for
        account: Address,
    },

    /// Proof does not verify against the manifest root
    #[error("invalid proof for entitlement {index}")]
    InvalidProof {
        /// Entitlement index
        index: u64,
    },

    /// Entitlement was redeemed before
    #[error("entitlement {index} already claimed")]
    AlreadyClaimed {
        /// Entitlement index
        index: u64,
    },

    /// Recipient balance did not move by the claimed amount
    #[error("balance of {account} moved from {before} to {after}, expected +{amount}")]
    BalanceMismatch {
        /// Recipient
        account: Address,
        /// Balance before the claim
        before: Amount,
        /// Balance after the claim
        after: Amount,
        /// Claimed amount
        amount: Amount,
    },
}

impl StageError {
    /// Whether the run must stop. Non-fatal errors are expected on reruns or
    /// before a vote has closed.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::NotExecutable { .. } | Self::InvalidProof { .. } | Self::AlreadyClaimed { .. }
        )
    }

    /// Lift claim rejections reported by the ledger to stage errors.
    pub(crate) fn lift_claim_rejection(self) -> Self {
        match self {
            Self::Ledger {
                source: LedgerError::Claim(ClaimError::AlreadyClaimed { index }),
                ..
            } => Self::AlreadyClaimed { index },
            Self::Ledger {
                source: LedgerError::Claim(ClaimError::InvalidProof { index }),
                ..
            } => Self::InvalidProof { index },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        assert!(!StageError::NotExecutable {
            proposal: ProposalId(1)
        }
        .is_fatal());
        assert!(!StageError::AlreadyClaimed { index: 3 }.is_fatal());
        assert!(StageError::AlreadyExecuted {
            proposal: ProposalId(1)
        }
        .is_fatal());
        assert!(StageError::Timeout {
            operation: "claim",
            timeout_ms: 10
        }
        .is_fatal());
    }

    #[test]
    fn test_claim_rejections_lifted() {
        let err = StageError::Ledger {
            operation: "claim",
            source: LedgerError::Claim(ClaimError::AlreadyClaimed { index: 4 }),
        }
        .lift_claim_rejection();
        assert!(matches!(err, StageError::AlreadyClaimed { index: 4 }));

        let err = StageError::Ledger {
            operation: "claim",
            source: LedgerError::Reverted {
                reason: "paused".to_string(),
            },
        }
        .lift_claim_rejection();
        assert!(matches!(err, StageError::Ledger { .. }));
    }
}
