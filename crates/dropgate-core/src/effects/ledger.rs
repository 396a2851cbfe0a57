//! Ledger effects: distributor deployment, claims, and token reads.

use crate::commitment::Proof;
use crate::contracts::ContractKind;
use crate::effects::governance::ProposalId;
use crate::entitlement::Entitlement;
use crate::errors::ClaimError;
use crate::types::{Address, Amount, Digest};
use async_trait::async_trait;

/// Errors reported by ledger and governance handlers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The node could not be reached or answered garbage
    #[error("ledger transport failed: {message}")]
    Transport {
        /// Transport-level description
        message: String,
    },

    /// The transaction was mined but reverted
    #[error("transaction reverted: {reason}")]
    Reverted {
        /// Revert reason
        reason: String,
    },

    /// Address does not hold the expected contract
    #[error("{address} is not a {expected} contract (found {found:?})")]
    WrongContract {
        /// Address that was called
        address: Address,
        /// Interface the caller expected
        expected: ContractKind,
        /// What actually lives there
        found: Option<ContractKind>,
    },

    /// Transfer source cannot cover the amount
    #[error("insufficient balance in {account}: needed {needed}, available {available}")]
    InsufficientBalance {
        /// Account that would be debited
        account: Address,
        /// Amount required
        needed: Amount,
        /// Amount held
        available: Amount,
    },

    /// Distributor rejected a claim
    #[error(transparent)]
    Claim(#[from] ClaimError),

    /// Proposal id unknown to the voting app
    #[error("unknown proposal {0}")]
    UnknownProposal(ProposalId),

    /// Voting on a proposal that is no longer open
    #[error("proposal {0} is closed for voting")]
    VoteClosed(ProposalId),

    /// Sender holds no voting power
    #[error("{account} has no voting power")]
    NoVotingPower {
        /// Sender
        account: Address,
    },

    /// Execute called on a proposal that has not passed
    #[error("proposal {0} cannot be executed")]
    CannotExecute(ProposalId),

    /// Execute called twice
    #[error("proposal {0} was already executed")]
    AlreadyExecuted(ProposalId),
}

/// A claim as submitted to a distributor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    /// What is being claimed
    pub entitlement: Entitlement,
    /// Proof against the distributor's root
    pub proof: Proof,
}

/// The `Claimed` event emitted by a successful claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimReceipt {
    /// Distributor that paid out
    pub distributor: Address,
    /// Claimed index
    pub index: u64,
    /// Recipient
    pub account: Address,
    /// Transferred amount
    pub amount: Amount,
}

/// Ledger operations the pipeline needs.
///
/// Mutating methods return only after the transaction is confirmed.
#[async_trait]
pub trait LedgerEffects: Send + Sync {
    /// Chain id of the connected network.
    async fn chain_id(&self) -> Result<u64, LedgerError>;

    /// Deploy a distributor for `token` bound to `root`.
    async fn deploy_distributor(
        &self,
        token: Address,
        root: Digest,
        from: Address,
    ) -> Result<Address, LedgerError>;

    /// Look up a distributor previously deployed by `deployer` for `(token, root)`.
    async fn find_distributor(
        &self,
        deployer: Address,
        token: Address,
        root: Digest,
    ) -> Result<Option<Address>, LedgerError>;

    /// The distributor's `token()`.
    async fn distributor_token(&self, distributor: Address) -> Result<Address, LedgerError>;

    /// The distributor's `merkleRoot()`.
    async fn distributor_root(&self, distributor: Address) -> Result<Digest, LedgerError>;

    /// The distributor's `isClaimed(index)`.
    async fn is_claimed(&self, distributor: Address, index: u64) -> Result<bool, LedgerError>;

    /// Submit `claim(index, account, amount, proof)` to the distributor.
    async fn claim(
        &self,
        distributor: Address,
        request: &ClaimRequest,
        from: Address,
    ) -> Result<ClaimReceipt, LedgerError>;

    /// The token's `totalSupply()`.
    async fn total_supply(&self, token: Address) -> Result<Amount, LedgerError>;

    /// The token's `balanceOf(account)`.
    async fn balance_of(&self, token: Address, account: Address) -> Result<Amount, LedgerError>;
}

/// Blanket implementation for Arc<T> where T: LedgerEffects
#[async_trait]
impl<T: LedgerEffects + ?Sized> LedgerEffects for std::sync::Arc<T> {
    async fn chain_id(&self) -> Result<u64, LedgerError> {
        (**self).chain_id().await
    }

    async fn deploy_distributor(
        &self,
        token: Address,
        root: Digest,
        from: Address,
    ) -> Result<Address, LedgerError> {
        (**self).deploy_distributor(token, root, from).await
    }

    async fn find_distributor(
        &self,
        deployer: Address,
        token: Address,
        root: Digest,
    ) -> Result<Option<Address>, LedgerError> {
        (**self).find_distributor(deployer, token, root).await
    }

    async fn distributor_token(&self, distributor: Address) -> Result<Address, LedgerError> {
        (**self).distributor_token(distributor).await
    }

    async fn distributor_root(&self, distributor: Address) -> Result<Digest, LedgerError> {
        (**self).distributor_root(distributor).await
    }

    async fn is_claimed(&self, distributor: Address, index: u64) -> Result<bool, LedgerError> {
        (**self).is_claimed(distributor, index).await
    }

    async fn claim(
        &self,
        distributor: Address,
        request: &ClaimRequest,
        from: Address,
    ) -> Result<ClaimReceipt, LedgerError> {
        (**self).claim(distributor, request, from).await
    }

    async fn total_supply(&self, token: Address) -> Result<Amount, LedgerError> {
        (**self).total_supply(token).await
    }

    async fn balance_of(&self, token: Address, account: Address) -> Result<Amount, LedgerError> {
        (**self).balance_of(token, account).await
    }
}
