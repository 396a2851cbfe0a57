use crate::config::VoterConfig;
use crate::context::StageContext;
use crate::errors::{Result, StageError};
use crate::keys;
use crate::stages::Stage;
use dropgate_core::{ContractKind, LedgerError, ProposalId, ProposalPhase, ProposalStatus};
use tracing::{debug, info};

/// Result of the Vote stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteSummary {
    /// Votes submitted by this run
    pub votes_cast: usize,
    /// Proposal tally after voting
    pub status: ProposalStatus,
}

/// Cast each configured holder's vote on the funding proposal.
///
/// With no voters configured the sender votes yea. A proposal that is no
/// longer open is left alone. With `execute_if_decided` the deciding vote
/// executes the payment, and later votes are skipped.
#[tracing::instrument(skip(ctx), fields(airdrop = %ctx.airdrop_id(), network = %ctx.network()))]
pub async fn vote(ctx: &StageContext) -> Result<VoteSummary> {
    let _lock = ctx.lock_state()?;
    let state = ctx.read_state_for(Stage::Vote)?;
    let voting = keys::app(&state, ContractKind::Voting)?;
    let id = ProposalId(state.get_u64(&keys::vote_id(ctx.airdrop_id()))?);

    let status = ctx
        .call("proposal", ctx.governance().proposal(voting.address, id))
        .await?;
    if status.phase != ProposalPhase::Open {
        info!(proposal = %id, phase = ?status.phase, "Proposal no longer open");
        return Ok(VoteSummary {
            votes_cast: 0,
            status,
        });
    }

    let voters = if ctx.config().voters.is_empty() {
        vec![VoterConfig {
            address: ctx.sender(),
            support: true,
        }]
    } else {
        ctx.config().voters.clone()
    };
    let execute_if_decided = ctx.config().execute_if_decided;

    let mut votes_cast = 0;
    for voter in &voters {
        let cast = ctx
            .call(
                "cast_vote",
                ctx.governance().cast_vote(
                    voting.address,
                    id,
                    voter.support,
                    execute_if_decided,
                    voter.address,
                ),
            )
            .await;
        match cast {
            Ok(()) => {
                votes_cast += 1;
                info!(proposal = %id, voter = %voter.address, support = voter.support, "Vote cast");
            }
            // The previous vote decided and executed the proposal
            Err(StageError::Ledger {
                source: LedgerError::VoteClosed(_),
                ..
            }) if execute_if_decided && votes_cast > 0 => {
                debug!(proposal = %id, "Vote closed by execution; skipping remaining voters");
                break;
            }
            Err(e) => return Err(e),
        }
    }

    let status = ctx
        .call("proposal", ctx.governance().proposal(voting.address, id))
        .await?;
    info!(%voting, proposal = %id, yea = %status.yea, nay = %status.nay, phase = ?status.phase, "Voting done");
    Ok(VoteSummary { votes_cast, status })
}
