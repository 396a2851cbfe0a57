//! Claim ledger: membership verification plus replay protection.
//!
//! Each committed index is `Unclaimed` until its first valid claim moves it to
//! `Claimed`, which is terminal. The claimed set is a bitmap of 64-bit words.
//! The replay check and the mark happen under one lock, so two concurrent
//! claims on the same index cannot both succeed. Claims on different indices
//! only contend for the lock briefly and never affect each other's outcome.

use crate::commitment::{verify, Commitment, Proof};
use crate::entitlement::Entitlement;
use crate::errors::ClaimError;
use crate::types::{Amount, Digest};
use parking_lot::Mutex;
use tracing::debug;

/// Claim state of one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStatus {
    /// Not yet redeemed
    Unclaimed,
    /// Redeemed; terminal
    Claimed,
}

#[derive(Debug)]
struct LedgerInner {
    bitmap: Vec<u64>,
    claimed_count: u64,
    claimed_amount: Amount,
}

/// Replay-protected claim ledger bound to one root.
#[derive(Debug)]
pub struct ClaimLedger {
    root: Digest,
    commitment: Option<Commitment>,
    inner: Mutex<LedgerInner>,
}

impl ClaimLedger {
    /// Create an empty ledger for `commitment`.
    ///
    /// Claims are checked against the full commitment: index in range and
    /// proof length equal to the tree height.
    pub fn new(commitment: Commitment) -> Self {
        let words = commitment.leaf_count.div_ceil(64) as usize;
        Self {
            root: commitment.root,
            commitment: Some(commitment),
            inner: Mutex::new(LedgerInner {
                bitmap: vec![0u64; words],
                claimed_count: 0,
                claimed_amount: Amount::zero(),
            }),
        }
    }

    /// Create an empty ledger that knows only the root, as a distributor
    /// contract does. Claims are checked by folding the proof alone.
    pub fn for_root(root: Digest) -> Self {
        Self {
            root,
            commitment: None,
            inner: Mutex::new(LedgerInner {
                bitmap: Vec::new(),
                claimed_count: 0,
                claimed_amount: Amount::zero(),
            }),
        }
    }

    /// Root this ledger enforces.
    pub fn root(&self) -> Digest {
        self.root
    }

    /// Full commitment, when the ledger was built from one.
    pub fn commitment(&self) -> Option<&Commitment> {
        self.commitment.as_ref()
    }

    /// Whether `proof` places `entitlement` under this ledger's root.
    pub fn verifies(&self, entitlement: &Entitlement, proof: &Proof) -> bool {
        match &self.commitment {
            Some(commitment) => commitment.verify(entitlement, proof),
            None => verify(&self.root, entitlement, proof),
        }
    }

    /// Redeem `entitlement`, returning the amount to transfer.
    ///
    /// Verification happens before the lock is taken and a rejected claim
    /// leaves the ledger untouched.
    pub fn claim(
        &self,
        root: &Digest,
        entitlement: &Entitlement,
        proof: &Proof,
    ) -> Result<Amount, ClaimError> {
        if *root != self.root {
            return Err(ClaimError::RootMismatch {
                expected: self.root,
                presented: *root,
            });
        }
        if !self.verifies(entitlement, proof) {
            return Err(ClaimError::InvalidProof {
                index: entitlement.index,
            });
        }

        let (word, mask) = bit_position(entitlement.index);
        let mut inner = self.inner.lock();
        if inner.bitmap.get(word).is_some_and(|bits| bits & mask != 0) {
            return Err(ClaimError::AlreadyClaimed {
                index: entitlement.index,
            });
        }
        // Only reachable with a verified proof, and the leaf binds the index
        if word >= inner.bitmap.len() {
            inner.bitmap.resize(word + 1, 0);
        }
        inner.bitmap[word] |= mask;
        inner.claimed_count += 1;
        inner.claimed_amount = inner.claimed_amount.saturating_add(entitlement.amount);
        drop(inner);

        debug!(
            index = entitlement.index,
            account = %entitlement.account,
            amount = %entitlement.amount,
            "Entitlement claimed"
        );
        Ok(entitlement.amount)
    }

    /// Whether `index` has been claimed. Out-of-range indices are never claimed.
    pub fn is_claimed(&self, index: u64) -> bool {
        self.status(index) == ClaimStatus::Claimed
    }

    /// Claim status of `index`.
    pub fn status(&self, index: u64) -> ClaimStatus {
        let (word, mask) = bit_position(index);
        let claimed = self
            .inner
            .lock()
            .bitmap
            .get(word)
            .is_some_and(|bits| bits & mask != 0);
        if claimed {
            ClaimStatus::Claimed
        } else {
            ClaimStatus::Unclaimed
        }
    }

    /// Number of redeemed entitlements.
    pub fn claimed_count(&self) -> u64 {
        self.inner.lock().claimed_count
    }

    /// Sum of redeemed amounts.
    pub fn claimed_amount(&self) -> Amount {
        self.inner.lock().claimed_amount
    }
}

fn bit_position(index: u64) -> (usize, u64) {
    ((index / 64) as usize, 1u64 << (index % 64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::build;
    use crate::types::Address;
    use std::sync::Arc;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    fn entries(n: u8) -> Vec<Entitlement> {
        (0..n)
            .map(|i| Entitlement::new(u64::from(i), addr(i + 1), u64::from(i) + 10))
            .collect()
    }

    #[test]
    fn test_claim_once() {
        let built = build(entries(3)).unwrap();
        let ledger = ClaimLedger::new(built.commitment);
        let e = entries(3)[1].clone();
        let proof = built.proof(1).unwrap();

        assert_eq!(ledger.status(1), ClaimStatus::Unclaimed);
        assert_eq!(ledger.claim(&built.root(), &e, proof), Ok(Amount::from(11u64)));
        assert!(ledger.is_claimed(1));
        assert_eq!(
            ledger.claim(&built.root(), &e, proof),
            Err(ClaimError::AlreadyClaimed { index: 1 })
        );
        assert_eq!(ledger.claimed_count(), 1);
        assert_eq!(ledger.claimed_amount(), Amount::from(11u64));
    }

    #[test]
    fn test_invalid_proof_leaves_no_trace() {
        let built = build(entries(4)).unwrap();
        let ledger = ClaimLedger::new(built.commitment);
        let mut e = entries(4)[2].clone();
        e.amount = Amount::from(1_000u64);

        assert_eq!(
            ledger.claim(&built.root(), &e, built.proof(2).unwrap()),
            Err(ClaimError::InvalidProof { index: 2 })
        );
        assert!(!ledger.is_claimed(2));
        assert_eq!(ledger.claimed_count(), 0);
    }

    #[test]
    fn test_root_mismatch() {
        let built = build(entries(2)).unwrap();
        let other = build(entries(3)).unwrap();
        let ledger = ClaimLedger::new(built.commitment);
        let err = ledger
            .claim(&other.root(), &entries(2)[0], built.proof(0).unwrap())
            .unwrap_err();
        assert!(matches!(err, ClaimError::RootMismatch { .. }));
    }

    #[test]
    fn test_indices_across_word_boundary() {
        let built = build(entries(130)).unwrap();
        let ledger = ClaimLedger::new(built.commitment);
        for index in [0u64, 63, 64, 127, 129] {
            let e = entries(130)[index as usize].clone();
            ledger
                .claim(&built.root(), &e, built.proof(index).unwrap())
                .unwrap();
        }
        assert!(ledger.is_claimed(64));
        assert!(!ledger.is_claimed(65));
        assert!(!ledger.is_claimed(500));
        assert_eq!(ledger.claimed_count(), 5);
    }

    #[test]
    fn test_root_only_ledger() {
        let built = build(entries(70)).unwrap();
        let ledger = ClaimLedger::for_root(built.root());
        assert!(ledger.commitment().is_none());
        let e = entries(70)[66].clone();
        let proof = built.proof(66).unwrap();

        assert_eq!(ledger.claim(&built.root(), &e, proof), Ok(Amount::from(76u64)));
        assert!(ledger.is_claimed(66));
        assert!(!ledger.is_claimed(3));
        assert_eq!(
            ledger.claim(&built.root(), &e, proof),
            Err(ClaimError::AlreadyClaimed { index: 66 })
        );

        let mut forged = e.clone();
        forged.index = 66 + 128;
        assert_eq!(
            ledger.claim(&built.root(), &forged, proof),
            Err(ClaimError::InvalidProof { index: 194 })
        );
    }

    #[test]
    fn test_concurrent_claims_on_same_index() {
        let built = build(entries(8)).unwrap();
        let ledger = Arc::new(ClaimLedger::new(built.commitment));
        let e = entries(8)[5].clone();
        let proof = built.proof(5).unwrap().clone();
        let root = built.root();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let e = e.clone();
                let proof = proof.clone();
                std::thread::spawn(move || ledger.claim(&root, &e, &proof).is_ok())
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(ledger.claimed_count(), 1);
    }
}
