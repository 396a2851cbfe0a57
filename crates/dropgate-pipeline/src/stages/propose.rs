use crate::context::StageContext;
use crate::errors::{Result, StageError};
use crate::keys;
use crate::math;
use crate::stages::Stage;
use dropgate_core::{Amount, Payment, ProposalId};
use tracing::info;

/// Payment reference attached to the funding proposal.
pub const PAYMENT_REFERENCE: &str = "transfer to the airdrop distributor contract";

/// Result of the Propose stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposeOutcome {
    /// A proposal was recorded by an earlier run
    Existing(ProposalId),
    /// A new proposal was created
    Proposed {
        /// New proposal
        id: ProposalId,
        /// Amount the DAO is asked to move
        amount: Amount,
        /// That amount as a share of token supply, e.g. `"5.00%"`
        supply_share: String,
    },
}

impl ProposeOutcome {
    /// Proposal id, however it was obtained.
    pub fn id(&self) -> ProposalId {
        match self {
            ProposeOutcome::Existing(id) | ProposeOutcome::Proposed { id, .. } => *id,
        }
    }
}

/// Propose a treasury payment of the manifest total to the distributor.
#[tracing::instrument(skip(ctx), fields(airdrop = %ctx.airdrop_id(), network = %ctx.network()))]
pub async fn propose(ctx: &StageContext) -> Result<ProposeOutcome> {
    let _lock = ctx.lock_state()?;
    let mut state = ctx.read_state_for(Stage::Propose)?;
    let key = keys::vote_id(ctx.airdrop_id());
    if state.contains(&key) {
        let id = ProposalId(state.get_u64(&key)?);
        info!(proposal = %id, "Funding already proposed");
        return Ok(ProposeOutcome::Existing(id));
    }

    let token = state.get_address(keys::DAO_TOKEN)?;
    let distributor = state.get_address(&keys::distributor(ctx.airdrop_id()))?;
    let apps = keys::dao_apps(&state)?;
    let manifest = ctx.load_manifest(&state)?;
    let amount = manifest.total();

    let supply = ctx
        .call("total_supply", ctx.ledger().total_supply(token))
        .await?;
    let supply_share =
        math::supply_share(amount, supply).ok_or(StageError::ZeroSupply { token })?;
    info!(%amount, %supply, share = %supply_share, %distributor, "Proposing funding");

    let payment = Payment {
        token,
        recipient: distributor,
        amount,
        reference: PAYMENT_REFERENCE.to_string(),
    };
    let id = ctx
        .call(
            "propose_payment",
            ctx.governance().propose_payment(&apps, &payment, ctx.sender()),
        )
        .await?;

    state.set_path(&key, id.0)?;
    ctx.persist_state(&state)?;
    info!(proposal = %id, "Funding proposed");
    Ok(ProposeOutcome::Proposed {
        id,
        amount,
        supply_share,
    })
}
