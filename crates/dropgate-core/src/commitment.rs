//! Merkle commitment over an entitlement set.
//!
//! A leaf is `H(index_be32 || account || amount_be32)`, the packed encoding a
//! distributor contract recomputes on-chain, so a proof binds the exact
//! account and amount and not merely a tree position. Leaves are placed in
//! index order, which makes the leaf index the path through the tree.

use crate::crypto::hash::hash_parts;
use crate::crypto::merkle::{fold_path, MerkleTree, MAX_MERKLE_DEPTH};
use crate::entitlement::{Entitlement, EntitlementSet};
use crate::errors::EntitlementError;
use crate::types::{amount_to_be_bytes, Digest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Published result of a tree build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commitment {
    /// Root digest
    pub root: Digest,
    /// Levels above the leaves; every proof has exactly this many digests
    pub height: u32,
    /// Number of committed entitlements
    pub leaf_count: u64,
}

impl Commitment {
    /// Verify membership with the structural checks the bare [`verify`]
    /// cannot make: the index must be inside the tree and the proof must have
    /// the tree's height.
    pub fn verify(&self, entitlement: &Entitlement, proof: &Proof) -> bool {
        entitlement.index < self.leaf_count
            && proof.len() == self.height as usize
            && verify(&self.root, entitlement, proof)
    }
}

/// Sibling digests from leaf to root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Proof(Vec<Digest>);

impl Proof {
    /// Wrap a sibling path.
    pub fn new(path: Vec<Digest>) -> Self {
        Self(path)
    }

    /// Sibling digests, leaf to root.
    pub fn path(&self) -> &[Digest] {
        &self.0
    }

    /// Number of siblings.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for a single-leaf tree.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Digest>> for Proof {
    fn from(path: Vec<Digest>) -> Self {
        Self(path)
    }
}

/// Commitment plus a proof for every index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentBuild {
    /// The published commitment
    pub commitment: Commitment,
    /// Proof per entitlement index
    pub proofs: BTreeMap<u64, Proof>,
}

impl CommitmentBuild {
    /// Commit to an already validated set.
    pub fn from_set(set: &EntitlementSet) -> Self {
        let leaves: Vec<Digest> = set.entries().iter().map(leaf_digest).collect();
        let Some(tree) = MerkleTree::from_leaves(leaves) else {
            unreachable!("EntitlementSet is never empty");
        };

        let proofs = set
            .entries()
            .iter()
            .enumerate()
            .filter_map(|(position, entry)| {
                tree.proof(position)
                    .map(|path| (entry.index, Proof::new(path)))
            })
            .collect();

        Self {
            commitment: Commitment {
                root: tree.root(),
                height: tree.height(),
                leaf_count: tree.leaf_count() as u64,
            },
            proofs,
        }
    }

    /// Root digest.
    pub fn root(&self) -> Digest {
        self.commitment.root
    }

    /// Proof for `index`.
    pub fn proof(&self, index: u64) -> Option<&Proof> {
        self.proofs.get(&index)
    }
}

/// Validate `entitlements` and build the commitment and all proofs.
///
/// Fails with the first structural problem found (`EmptySet`,
/// `DuplicateIndex`, `DuplicateAccount`, ...). Any ordering of the same
/// entitlements produces the same root.
pub fn build(entitlements: Vec<Entitlement>) -> Result<CommitmentBuild, EntitlementError> {
    let set = EntitlementSet::new(entitlements)?;
    Ok(CommitmentBuild::from_set(&set))
}

/// Leaf digest for one entitlement.
pub fn leaf_digest(entitlement: &Entitlement) -> Digest {
    let mut index = [0u8; 32];
    index[24..].copy_from_slice(&entitlement.index.to_be_bytes());
    let amount = amount_to_be_bytes(&entitlement.amount);
    hash_parts(&[&index, entitlement.account.as_bytes(), &amount])
}

/// Check that `proof` places `entitlement` under `root`. Pure.
///
/// Paths longer than [`MAX_MERKLE_DEPTH`] are rejected without hashing.
pub fn verify(root: &Digest, entitlement: &Entitlement, proof: &Proof) -> bool {
    proof.len() <= MAX_MERKLE_DEPTH as usize
        && fold_path(leaf_digest(entitlement), entitlement.index, proof.path()) == *root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, Amount};

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    fn two_entries() -> Vec<Entitlement> {
        vec![
            Entitlement::new(0, addr(0xa), 100u64),
            Entitlement::new(1, addr(0xb), 200u64),
        ]
    }

    #[test]
    fn test_two_entry_scenario() {
        let built = build(two_entries()).unwrap();
        let root = built.root();
        let p0 = built.proof(0).unwrap();
        let p1 = built.proof(1).unwrap();

        assert!(verify(&root, &Entitlement::new(0, addr(0xa), 100u64), p0));
        assert!(verify(&root, &Entitlement::new(1, addr(0xb), 200u64), p1));
        assert!(!verify(&root, &Entitlement::new(0, addr(0xa), 101u64), p0));
        assert_eq!(built.commitment.height, 1);
        assert_eq!(built.commitment.leaf_count, 2);
    }

    #[test]
    fn test_build_is_order_independent() {
        let mut reversed = two_entries();
        reversed.reverse();
        assert_eq!(build(two_entries()).unwrap().root(), build(reversed).unwrap().root());
    }

    #[test]
    fn test_single_field_mutations_fail() {
        let built = build(two_entries()).unwrap();
        let root = built.root();
        let p0 = built.proof(0).unwrap();

        assert!(!verify(&root, &Entitlement::new(0, addr(0xc), 100u64), p0));
        assert!(!verify(&root, &Entitlement::new(1, addr(0xa), 100u64), p0));
        assert!(!verify(&root, &Entitlement::new(0, addr(0xa), Amount::from(99u64)), p0));
    }

    #[test]
    fn test_swapped_proof_fails() {
        let built = build(two_entries()).unwrap();
        let p1 = built.proof(1).unwrap();
        assert!(!verify(&built.root(), &Entitlement::new(0, addr(0xa), 100u64), p1));
    }

    #[test]
    fn test_commitment_verify_checks_structure() {
        let built = build(vec![
            Entitlement::new(0, addr(1), 1u64),
            Entitlement::new(1, addr(2), 2u64),
            Entitlement::new(2, addr(3), 3u64),
        ])
        .unwrap();
        let commitment = built.commitment;
        let e2 = Entitlement::new(2, addr(3), 3u64);
        assert!(commitment.verify(&e2, built.proof(2).unwrap()));

        let mut short = built.proof(2).unwrap().path().to_vec();
        short.pop();
        assert!(!commitment.verify(&e2, &Proof::new(short)));

        let outside = Entitlement::new(7, addr(3), 3u64);
        assert!(!commitment.verify(&outside, built.proof(2).unwrap()));
    }

    #[test]
    fn test_oversized_proof_rejected() {
        let e = Entitlement::new(0, addr(1), 5u64);
        // Fold the leaf up through self-pairs one level past the depth bound
        let path: Vec<Digest> = (0..=MAX_MERKLE_DEPTH)
            .scan(leaf_digest(&e), |node, _| {
                let sibling = *node;
                *node = crate::crypto::hash::hash_pair(&sibling, &sibling);
                Some(sibling)
            })
            .collect();
        let root = fold_path(leaf_digest(&e), 0, &path);
        assert!(!verify(&root, &e, &Proof::new(path.clone())));

        let within = &path[..MAX_MERKLE_DEPTH as usize];
        let root = fold_path(leaf_digest(&e), 0, within);
        assert!(verify(&root, &e, &Proof::new(within.to_vec())));
    }

    #[test]
    fn test_single_entitlement_root_is_leaf() {
        let e = Entitlement::new(0, addr(1), 5u64);
        let built = build(vec![e.clone()]).unwrap();
        assert_eq!(built.root(), leaf_digest(&e));
        assert!(built.proof(0).unwrap().is_empty());
        assert!(built.commitment.verify(&e, built.proof(0).unwrap()));
    }

    #[test]
    fn test_build_rejects_malformed_sets() {
        assert_eq!(build(vec![]).unwrap_err(), EntitlementError::EmptySet);
        assert_eq!(
            build(vec![
                Entitlement::new(0, addr(1), 1u64),
                Entitlement::new(1, addr(1), 1u64),
            ])
            .unwrap_err(),
            EntitlementError::DuplicateAccount(addr(1))
        );
    }
}
