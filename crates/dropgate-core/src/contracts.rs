//! Static registry of the contract interfaces the pipeline talks to.
//!
//! Contracts are identified by [`ContractKind`], never by a runtime string, so
//! a missing interface is a compile error rather than a missing schema file.

use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Interface description of one contract kind.
#[derive(Debug, PartialEq, Eq)]
pub struct ContractInterface {
    /// Contract name as it appears in logs and artifacts
    pub name: &'static str,
    /// Methods the pipeline may call
    pub methods: &'static [&'static str],
}

static MERKLE_DISTRIBUTOR: ContractInterface = ContractInterface {
    name: "MerkleDistributor",
    methods: &["token", "merkleRoot", "isClaimed", "claim"],
};

static ERC20: ContractInterface = ContractInterface {
    name: "ERC20",
    methods: &["totalSupply", "balanceOf", "transfer"],
};

static TOKEN_MANAGER: ContractInterface = ContractInterface {
    name: "TokenManager",
    methods: &["token", "forward"],
};

static FINANCE: ContractInterface = ContractInterface {
    name: "Finance",
    methods: &["newImmediatePayment"],
};

static VOTING: ContractInterface = ContractInterface {
    name: "Voting",
    methods: &["newVote", "vote", "canExecute", "executeVote", "getVote"],
};

/// Known contract kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContractKind {
    /// Airdrop distributor holding the Merkle root
    MerkleDistributor,
    /// The DAO token
    Erc20,
    /// DAO token manager app (forwards proposals from holders)
    TokenManager,
    /// DAO finance app (executes payments from the vault)
    Finance,
    /// DAO voting app
    Voting,
}

impl ContractKind {
    /// Every kind, in declaration order.
    pub const ALL: [ContractKind; 5] = [
        ContractKind::MerkleDistributor,
        ContractKind::Erc20,
        ContractKind::TokenManager,
        ContractKind::Finance,
        ContractKind::Voting,
    ];

    /// Interface table for this kind.
    pub fn interface(self) -> &'static ContractInterface {
        match self {
            ContractKind::MerkleDistributor => &MERKLE_DISTRIBUTOR,
            ContractKind::Erc20 => &ERC20,
            ContractKind::TokenManager => &TOKEN_MANAGER,
            ContractKind::Finance => &FINANCE,
            ContractKind::Voting => &VOTING,
        }
    }

    /// Contract name.
    pub fn name(self) -> &'static str {
        self.interface().name
    }

    /// Whether `method` is part of this kind's interface.
    pub fn supports(self, method: &str) -> bool {
        self.interface().methods.contains(&method)
    }

    /// State key under which a DAO app's proxy is recorded, if this kind is a DAO app.
    pub fn app_state_key(self) -> Option<&'static str> {
        match self {
            ContractKind::TokenManager => Some("app:aragon-token-manager"),
            ContractKind::Finance => Some("app:aragon-finance"),
            ContractKind::Voting => Some("app:aragon-voting"),
            ContractKind::MerkleDistributor | ContractKind::Erc20 => None,
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed reference to a deployed contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContractHandle {
    /// What the contract is
    pub kind: ContractKind,
    /// Where it lives
    pub address: Address,
}

impl ContractHandle {
    /// Reference the contract of `kind` at `address`.
    pub fn at(kind: ContractKind, address: Address) -> Self {
        Self { kind, address }
    }
}

impl fmt::Display for ContractHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind, self.address)
    }
}
