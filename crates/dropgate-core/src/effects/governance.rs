//! Governance effects: the DAO voting app as a black box.
//!
//! A funding proposal moves `Open → {Passed | Rejected} → Executed`, with
//! `Executed` terminal. How votes are weighted is the DAO's business; the
//! pipeline only proposes, votes, asks whether execution is allowed, and
//! executes.

use crate::effects::ledger::LedgerError;
use crate::types::{Address, Amount};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned by the voting app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(pub u64);

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Proxy addresses of the DAO apps a payment proposal goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaoApps {
    /// Voting app
    pub voting: Address,
    /// Token manager (forwards the holder's proposal)
    pub token_manager: Address,
    /// Finance app (pays out on execution)
    pub finance: Address,
}

/// A payment out of the DAO vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    /// Token to pay in
    pub token: Address,
    /// Receiver
    pub recipient: Address,
    /// Amount
    pub amount: Amount,
    /// Free-form reference stored with the payment
    pub reference: String,
}

/// Lifecycle phase of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalPhase {
    /// Accepting votes
    Open,
    /// Closed with enough support; awaiting execution
    Passed,
    /// Closed without enough support
    Rejected,
    /// Executed; terminal
    Executed,
}

/// Snapshot of a proposal's tallies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalStatus {
    /// Proposal id
    pub id: ProposalId,
    /// Current phase
    pub phase: ProposalPhase,
    /// Voting power in favour
    pub yea: Amount,
    /// Voting power against
    pub nay: Amount,
    /// Total voting power at the proposal snapshot
    pub voting_power: Amount,
    /// Receiver of the payment the proposal executes
    pub recipient: Address,
    /// Amount of the payment the proposal executes
    pub amount: Amount,
}

impl ProposalStatus {
    /// Whether the proposal already executed.
    pub fn executed(&self) -> bool {
        self.phase == ProposalPhase::Executed
    }
}

/// The DAO operations the pipeline consumes.
#[async_trait]
pub trait GovernanceAdapter: Send + Sync {
    /// Open a vote on `payment`, forwarded through the token manager. Returns the vote id.
    async fn propose_payment(
        &self,
        apps: &DaoApps,
        payment: &Payment,
        from: Address,
    ) -> Result<ProposalId, LedgerError>;

    /// Cast a vote. With `execute_if_decided`, the vote executes the proposal
    /// as soon as it becomes executable.
    async fn cast_vote(
        &self,
        voting: Address,
        proposal: ProposalId,
        support: bool,
        execute_if_decided: bool,
        from: Address,
    ) -> Result<(), LedgerError>;

    /// Whether `execute` would succeed now.
    async fn can_execute(&self, voting: Address, proposal: ProposalId) -> Result<bool, LedgerError>;

    /// Execute a passed proposal.
    async fn execute(
        &self,
        voting: Address,
        proposal: ProposalId,
        from: Address,
    ) -> Result<(), LedgerError>;

    /// Current tallies and phase.
    async fn proposal(
        &self,
        voting: Address,
        proposal: ProposalId,
    ) -> Result<ProposalStatus, LedgerError>;
}

/// Blanket implementation for Arc<T> where T: GovernanceAdapter
#[async_trait]
impl<T: GovernanceAdapter + ?Sized> GovernanceAdapter for std::sync::Arc<T> {
    async fn propose_payment(
        &self,
        apps: &DaoApps,
        payment: &Payment,
        from: Address,
    ) -> Result<ProposalId, LedgerError> {
        (**self).propose_payment(apps, payment, from).await
    }

    async fn cast_vote(
        &self,
        voting: Address,
        proposal: ProposalId,
        support: bool,
        execute_if_decided: bool,
        from: Address,
    ) -> Result<(), LedgerError> {
        (**self)
            .cast_vote(voting, proposal, support, execute_if_decided, from)
            .await
    }

    async fn can_execute(&self, voting: Address, proposal: ProposalId) -> Result<bool, LedgerError> {
        (**self).can_execute(voting, proposal).await
    }

    async fn execute(
        &self,
        voting: Address,
        proposal: ProposalId,
        from: Address,
    ) -> Result<(), LedgerError> {
        (**self).execute(voting, proposal, from).await
    }

    async fn proposal(
        &self,
        voting: Address,
        proposal: ProposalId,
    ) -> Result<ProposalStatus, LedgerError> {
        (**self).proposal(voting, proposal).await
    }
}
