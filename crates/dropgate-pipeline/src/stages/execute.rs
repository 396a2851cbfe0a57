use crate::context::StageContext;
use crate::errors::{Result, StageError};
use crate::keys;
use crate::stages::Stage;
use dropgate_core::{Address, Amount, ContractKind, ProposalId};
use tracing::{info, warn};

/// Result of the Execute stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOutcome {
    /// Executed proposal
    pub proposal: ProposalId,
    /// Funded distributor
    pub distributor: Address,
    /// Distributor balance after execution
    pub distributor_balance: Amount,
}

/// Execute the funding proposal, then check the distributor can pay every claim.
///
/// A proposal that would pay anyone but the recorded distributor, or anything
/// but the manifest total, is refused before it executes.
#[tracing::instrument(skip(ctx), fields(airdrop = %ctx.airdrop_id(), network = %ctx.network()))]
pub async fn execute(ctx: &StageContext) -> Result<ExecuteOutcome> {
    let _lock = ctx.lock_state()?;
    let state = ctx.read_state_for(Stage::Execute)?;
    let token = state.get_address(keys::DAO_TOKEN)?;
    let voting = keys::app(&state, ContractKind::Voting)?;
    let distributor = state.get_address(&keys::distributor(ctx.airdrop_id()))?;
    let proposal = ProposalId(state.get_u64(&keys::vote_id(ctx.airdrop_id()))?);
    let manifest = ctx.load_manifest(&state)?;

    let status = ctx
        .call("proposal", ctx.governance().proposal(voting.address, proposal))
        .await?;
    if status.executed() {
        return Err(StageError::AlreadyExecuted { proposal });
    }
    if status.recipient != distributor || status.amount != manifest.total() {
        warn!(%proposal, recipient = %status.recipient, amount = %status.amount, "Proposal does not fund this distributor");
        return Err(StageError::PaymentMismatch {
            proposal,
            expected_recipient: distributor,
            expected_amount: manifest.total(),
            recipient: status.recipient,
            amount: status.amount,
        });
    }
    let executable = ctx
        .call("can_execute", ctx.governance().can_execute(voting.address, proposal))
        .await?;
    if !executable {
        warn!(%proposal, yea = %status.yea, nay = %status.nay, "Proposal not executable");
        return Err(StageError::NotExecutable { proposal });
    }

    ctx.call(
        "execute",
        ctx.governance().execute(voting.address, proposal, ctx.sender()),
    )
    .await?;
    info!(%proposal, "Proposal executed");

    let balance = ctx
        .call("balance_of", ctx.ledger().balance_of(token, distributor))
        .await?;
    if balance < manifest.total() {
        return Err(StageError::UnderfundedDistributor {
            distributor,
            expected: manifest.total(),
            actual: balance,
        });
    }
    info!(%distributor, %balance, "Distributor funded");
    Ok(ExecuteOutcome {
        proposal,
        distributor,
        distributor_balance: balance,
    })
}
