//! Pure synchronous hashing for commitments.
//!
//! Every digest in the workspace goes through this module so the algorithm is
//! chosen in exactly one place. The algorithm is **Keccak-256**, the hash a
//! distributor contract recomputes on-chain when it checks a claim.
//!
//! ```ignore
//! use dropgate_core::crypto::hash::{hash, hash_parts};
//!
//! let digest = hash(b"hello world");
//! let same = hash_parts(&[b"hello", b" ", b"world"]);
//! assert_eq!(digest, same);
//! ```

use crate::types::Digest;
use sha3::{Digest as _, Keccak256};

/// Hash a byte slice to a 32-byte digest.
pub fn hash(data: &[u8]) -> Digest {
    let out: [u8; 32] = Keccak256::digest(data).into();
    Digest::from_bytes(out)
}

/// Hash the concatenation of several byte slices without allocating.
pub fn hash_parts(parts: &[&[u8]]) -> Digest {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    let out: [u8; 32] = hasher.finalize().into();
    Digest::from_bytes(out)
}

/// Combine two child digests: `H(left || right)`.
///
/// The pairing is order-sensitive: `hash_pair(a, b) != hash_pair(b, a)` for
/// `a != b`, so a proof cannot be replayed with its siblings swapped.
pub fn hash_pair(left: &Digest, right: &Digest) -> Digest {
    hash_parts(&[left.as_bytes(), right.as_bytes()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_empty_input() {
        // Well-known Keccak-256 of the empty string.
        assert_eq!(
            hash(b"").to_string(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_hash_parts_matches_concatenation() {
        assert_eq!(hash(b"hello world"), hash_parts(&[b"hello", b" ", b"world"]));
    }

    #[test]
    fn test_hash_pair_is_order_sensitive() {
        let a = hash(b"a");
        let b = hash(b"b");
        assert_ne!(hash_pair(&a, &b), hash_pair(&b, &a));
    }
}
