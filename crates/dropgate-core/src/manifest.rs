//! Entitlement manifest file.
//!
//! ```json
//! {
//!   "merkleRoot": "0x…",
//!   "tokenTotal": "0x…",
//!   "claims": { "0xacc…": { "index": 0, "amount": "0x64", "proof": ["0x…"] } }
//! }
//! ```
//!
//! A manifest is only trusted after [`MerkleManifest::verify`]: the declared
//! total must equal the sum of claims, the tree rebuilt from the claims must
//! reproduce `merkleRoot`, and every listed proof must verify.

use crate::commitment::{Commitment, CommitmentBuild, Proof};
use crate::effects::ClaimRequest;
use crate::entitlement::{Entitlement, EntitlementSet};
use crate::errors::EntitlementError;
use crate::types::{amount_hex, Address, Amount, Digest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Errors raised while reading, writing or checking a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Manifest could not be read
    #[error("failed to read manifest {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Manifest is not valid JSON of the expected shape
    #[error("failed to parse manifest {path}: {source}")]
    Parse {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Manifest could not be written
    #[error("failed to write manifest {path}: {source}")]
    Write {
        /// Destination
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The claims do not form a valid entitlement set
    #[error("malformed entitlement set: {0}")]
    Entitlements(#[from] EntitlementError),

    /// Declared root differs from the rebuilt one
    #[error("merkle root mismatch: manifest declares {declared}, claims hash to {computed}")]
    RootMismatch {
        /// `merkleRoot` field
        declared: Digest,
        /// Root rebuilt from the claims
        computed: Digest,
    },

    /// A listed proof does not verify
    #[error("proof for {account} does not verify")]
    InvalidProof {
        /// Claim owner
        account: Address,
    },
}

/// One account's entry in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestClaim {
    /// Leaf index
    pub index: u64,
    /// Claimable amount
    #[serde(with = "amount_hex")]
    pub amount: Amount,
    /// Sibling path
    pub proof: Proof,
}

/// The manifest as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleManifest {
    /// Committed root
    pub merkle_root: Digest,
    /// Sum of all claim amounts
    #[serde(with = "amount_hex")]
    pub token_total: Amount,
    /// Claims keyed by account
    pub claims: BTreeMap<Address, ManifestClaim>,
}

impl MerkleManifest {
    /// Render a build of `set` as a manifest.
    pub fn from_build(set: &EntitlementSet, build: &CommitmentBuild) -> Self {
        let claims = set
            .entries()
            .iter()
            .map(|entry| {
                let proof = build.proof(entry.index).cloned().unwrap_or_default();
                (
                    entry.account,
                    ManifestClaim {
                        index: entry.index,
                        amount: entry.amount,
                        proof,
                    },
                )
            })
            .collect();

        Self {
            merkle_root: build.root(),
            token_total: set.total(),
            claims,
        }
    }

    /// Build the commitment for `set` and render it.
    pub fn from_set(set: &EntitlementSet) -> Self {
        Self::from_build(set, &CommitmentBuild::from_set(set))
    }

    /// Parse manifest JSON. `path` is only used in error messages.
    pub fn from_json(text: &str, path: &Path) -> Result<Self, ManifestError> {
        serde_json::from_str(text).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read and fully verify the manifest at `path`.
    pub fn load(path: &Path) -> Result<VerifiedManifest, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text, path)?.verify()
    }

    /// Write as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| ManifestError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check totals, root and every proof.
    pub fn verify(self) -> Result<VerifiedManifest, ManifestError> {
        let entries = self
            .claims
            .iter()
            .map(|(account, claim)| Entitlement::new(claim.index, *account, claim.amount))
            .collect();
        let set = EntitlementSet::with_declared_total(entries, self.token_total)?;

        let build = CommitmentBuild::from_set(&set);
        if build.root() != self.merkle_root {
            return Err(ManifestError::RootMismatch {
                declared: self.merkle_root,
                computed: build.root(),
            });
        }

        for entry in set.entries() {
            let verified = self
                .claims
                .get(&entry.account)
                .is_some_and(|claim| build.commitment.verify(entry, &claim.proof));
            if !verified {
                return Err(ManifestError::InvalidProof {
                    account: entry.account,
                });
            }
        }

        Ok(VerifiedManifest {
            manifest: self,
            entitlements: set,
            commitment: build.commitment,
        })
    }
}

/// A manifest whose root, total and proofs have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedManifest {
    manifest: MerkleManifest,
    entitlements: EntitlementSet,
    commitment: Commitment,
}

impl VerifiedManifest {
    /// The on-disk form.
    pub fn manifest(&self) -> &MerkleManifest {
        &self.manifest
    }

    /// Entitlements in index order.
    pub fn entitlements(&self) -> &EntitlementSet {
        &self.entitlements
    }

    /// Commitment rebuilt from the claims.
    pub fn commitment(&self) -> &Commitment {
        &self.commitment
    }

    /// Root digest.
    pub fn root(&self) -> Digest {
        self.commitment.root
    }

    /// Sum of all amounts; the transfer a funding proposal requests.
    pub fn total(&self) -> Amount {
        self.entitlements.total()
    }

    /// Claim request for `account`, if it has an entitlement.
    pub fn claim_for(&self, account: &Address) -> Option<ClaimRequest> {
        let entitlement = self.entitlements.find_account(account)?;
        let claim = self.manifest.claims.get(account)?;
        Some(ClaimRequest {
            entitlement: entitlement.clone(),
            proof: claim.proof.clone(),
        })
    }

    /// Claim requests for every entitlement, in index order.
    pub fn claim_requests(&self) -> Vec<ClaimRequest> {
        self.entitlements
            .entries()
            .iter()
            .filter_map(|e| self.claim_for(&e.account))
            .collect()
    }
}
