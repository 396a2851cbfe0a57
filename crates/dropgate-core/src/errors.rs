//! Domain error types for entitlements and claims.
//!
//! Entitlement errors are fatal: a malformed set is rejected before any
//! commitment is built. Claim errors are local to one claim attempt and never
//! leave state behind, so the caller decides whether to retry or ignore them.

use crate::types::{Address, Amount, Digest};

/// A malformed entitlement set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntitlementError {
    /// No entitlements at all
    #[error("entitlement set is empty")]
    EmptySet,

    /// Two entitlements share an index
    #[error("duplicate entitlement index {0}")]
    DuplicateIndex(u64),

    /// Two entitlements share an account
    #[error("duplicate entitlement account {0}")]
    DuplicateAccount(Address),

    /// Indices are not dense from zero
    #[error("entitlement indices must be dense from 0: expected {expected}, found {found}")]
    IndexGap {
        /// Index required at this position
        expected: u64,
        /// Index actually present
        found: u64,
    },

    /// An entitlement with nothing to claim
    #[error("entitlement {index} has zero amount")]
    ZeroAmount {
        /// Offending index
        index: u64,
    },

    /// Declared total disagrees with the sum of amounts
    #[error("declared total {declared} does not match sum of amounts {actual}")]
    TotalMismatch {
        /// Total written in the manifest
        declared: Amount,
        /// Sum of all entitlement amounts
        actual: Amount,
    },

    /// Sum of amounts does not fit 256 bits
    #[error("sum of entitlement amounts overflows 256 bits")]
    AmountOverflow,
}

/// A rejected claim attempt. Rejections never mutate the ledger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimError {
    /// Proof does not fold to the committed root for this entitlement
    #[error("invalid proof for entitlement {index}")]
    InvalidProof {
        /// Index the claim was made for
        index: u64,
    },

    /// Index was already redeemed
    #[error("entitlement {index} already claimed")]
    AlreadyClaimed {
        /// Index the claim was made for
        index: u64,
    },

    /// Claim presented against a different commitment
    #[error("root mismatch: ledger is bound to {expected}, claim presented {presented}")]
    RootMismatch {
        /// Root the ledger is bound to
        expected: Digest,
        /// Root the claimant presented
        presented: Digest,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EntitlementError::DuplicateIndex(3);
        assert_eq!(err.to_string(), "duplicate entitlement index 3");

        let err = ClaimError::AlreadyClaimed { index: 7 };
        assert_eq!(err.to_string(), "entitlement 7 already claimed");
    }

    #[test]
    fn test_claim_errors_are_distinguishable() {
        let invalid = ClaimError::InvalidProof { index: 1 };
        let replay = ClaimError::AlreadyClaimed { index: 1 };
        assert_ne!(invalid, replay);
    }
}
