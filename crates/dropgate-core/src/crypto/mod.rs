//! Cryptographic building blocks: the hash function and raw Merkle trees.

pub mod hash;
pub mod merkle;

pub use hash::{hash, hash_pair, hash_parts};
pub use merkle::{fold_path, MerkleTree, MAX_MERKLE_DEPTH};
