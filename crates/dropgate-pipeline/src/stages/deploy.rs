use crate::context::StageContext;
use crate::errors::{Result, StageError};
use crate::keys;
use crate::stages::Stage;
use dropgate_core::{Address, Digest, LedgerError};
use tracing::{info, warn};

/// How the Deploy stage obtained its distributor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployOutcome {
    /// The recorded distributor already matches the manifest
    Existing(Address),
    /// A matching distributor from an earlier, unrecorded run was found on the ledger
    Adopted(Address),
    /// A new distributor was deployed
    Deployed(Address),
}

impl DeployOutcome {
    /// Distributor address, however it was obtained.
    pub fn address(&self) -> Address {
        match *self {
            DeployOutcome::Existing(a) | DeployOutcome::Adopted(a) | DeployOutcome::Deployed(a) => a,
        }
    }
}

/// Deploy the airdrop's distributor and record its address.
///
/// Reruns are no-ops when the recorded distributor still commits to the
/// manifest's root and token. A distributor deployed by a run that crashed
/// before persisting is adopted instead of deployed twice. Replacing a
/// recorded distributor also drops the airdrop's recorded proposal, so the
/// next Propose asks the DAO to fund the new one.
#[tracing::instrument(skip(ctx), fields(airdrop = %ctx.airdrop_id(), network = %ctx.network()))]
pub async fn deploy(ctx: &StageContext) -> Result<DeployOutcome> {
    let _lock = ctx.lock_state()?;
    let mut state = ctx.read_state_for(Stage::Deploy)?;
    let token = state.get_address(keys::DAO_TOKEN)?;
    let manifest = ctx.load_manifest(&state)?;
    let root = manifest.root();
    let key = keys::distributor(ctx.airdrop_id());

    let mut replacing = false;
    if state.contains(&key) {
        let recorded = state.get_address(&key)?;
        if matches_manifest(ctx, recorded, token, root).await? {
            info!(distributor = %recorded, "Distributor already deployed");
            return Ok(DeployOutcome::Existing(recorded));
        }
        if !ctx.config().force_redeploy {
            return Err(StageError::DistributorExists { address: recorded });
        }
        warn!(distributor = %recorded, "Replacing recorded distributor");
        replacing = true;
    }

    let outcome = match ctx
        .call(
            "find_distributor",
            ctx.ledger().find_distributor(ctx.sender(), token, root),
        )
        .await?
    {
        Some(existing) => {
            info!(distributor = %existing, "Adopting unrecorded distributor");
            DeployOutcome::Adopted(existing)
        }
        None => {
            let deployed = ctx
                .call(
                    "deploy_distributor",
                    ctx.ledger().deploy_distributor(token, root, ctx.sender()),
                )
                .await?;
            info!(distributor = %deployed, %root, "Deployed distributor");
            DeployOutcome::Deployed(deployed)
        }
    };

    state.set_path(&key, outcome.address().to_string())?;
    if replacing {
        // The recorded proposal pays the replaced distributor
        let vote_key = keys::vote_id(ctx.airdrop_id());
        if let Some(stale) = state.remove_path(&vote_key)? {
            warn!(proposal = %stale, "Discarding funding proposal of the replaced distributor");
        }
    }
    ctx.persist_state(&state)?;
    Ok(outcome)
}

async fn matches_manifest(
    ctx: &StageContext,
    distributor: Address,
    token: Address,
    root: Digest,
) -> Result<bool> {
    let onchain_token = match ctx
        .call("distributor_token", ctx.ledger().distributor_token(distributor))
        .await
    {
        Ok(t) => t,
        Err(StageError::Ledger {
            source: LedgerError::WrongContract { .. },
            ..
        }) => return Ok(false),
        Err(e) => return Err(e),
    };
    let onchain_root = ctx
        .call("distributor_root", ctx.ledger().distributor_root(distributor))
        .await?;
    Ok(onchain_token == token && onchain_root == root)
}
