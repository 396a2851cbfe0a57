//! Merkle tree utilities over pre-hashed leaves.
//!
//! Levels are built bottom-up by hashing adjacent pairs left-then-right. A level
//! with an odd number of nodes pairs its last node with itself, so every leaf
//! has a sibling at every level and every proof is exactly `height` digests
//! long. Verification reads the leaf position bit by bit to decide on which
//! side the sibling sits.

use crate::crypto::hash::hash_pair;
use crate::types::Digest;

/// Maximum depth of a tree (supports up to 2^32 leaves)
pub const MAX_MERKLE_DEPTH: u32 = 32;

/// A fully materialized tree. `levels[0]` holds the leaves, the last level the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Vec<Vec<Digest>>,
}

impl MerkleTree {
    /// Build a tree from leaf digests. Returns `None` for an empty leaf list.
    pub fn from_leaves(leaves: Vec<Digest>) -> Option<Self> {
        if leaves.is_empty() {
            return None;
        }

        let mut levels = vec![leaves];
        while let Some(level) = levels.last().filter(|level| level.len() > 1) {
            let next: Vec<Digest> = level
                .chunks(2)
                .map(|pair| {
                    let left = pair[0];
                    let right = pair.get(1).copied().unwrap_or(left);
                    hash_pair(&left, &right)
                })
                .collect();
            levels.push(next);
        }

        Some(Self { levels })
    }

    /// Root digest.
    pub fn root(&self) -> Digest {
        // from_leaves guarantees at least one level with one node
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or_default()
    }

    /// Number of hashing levels above the leaves.
    pub fn height(&self) -> u32 {
        (self.levels.len() - 1) as u32
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Sibling path for the leaf at `leaf_index`, ordered leaf to root.
    pub fn proof(&self, leaf_index: usize) -> Option<Vec<Digest>> {
        if leaf_index >= self.leaf_count() {
            return None;
        }

        let mut path = Vec::with_capacity(self.height() as usize);
        let mut index = leaf_index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = index ^ 1;
            // Lone trailing node is its own sibling
            path.push(level.get(sibling).copied().unwrap_or(level[index]));
            index /= 2;
        }
        Some(path)
    }
}

/// Fold a sibling path onto a leaf digest and return the implied root.
pub fn fold_path(leaf: Digest, leaf_index: u64, path: &[Digest]) -> Digest {
    let mut current = leaf;
    let mut index = leaf_index;
    for sibling in path {
        current = if index & 1 == 0 {
            hash_pair(&current, sibling)
        } else {
            hash_pair(sibling, &current)
        };
        index >>= 1;
    }
    current
}
