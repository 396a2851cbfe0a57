//! Simulate Command Handler
//!
//! Runs Deploy, Propose, Vote, Execute and Claim against a fresh in-process
//! chain. The DAO is seeded with equal stakes for the sender and every
//! configured voter, and a vault holding exactly the manifest total.

use anyhow::{Context, Result};
use dropgate_core::{Address, Amount, GovernanceAdapter, LedgerEffects, MerkleManifest};
use dropgate_pipeline::{
    claim_all, deploy, execute, keys, propose, vote, PipelineConfig, StageContext, StageError,
};
use dropgate_simulator::{SimulatedChain, VotingSettings};
use dropgate_store::{NetworkState, NetworkStateStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Subdirectory of `state_dir` simulated runs write to.
pub const SIMULATED_STATE_DIR: &str = "simulated";

/// What a simulated run left behind.
#[derive(Debug)]
pub struct Simulation {
    /// The chain the run used
    pub chain: Arc<SimulatedChain>,
    /// Governance and airdrop token
    pub token: Address,
    /// Distributor deployed by the run
    pub distributor: Address,
    /// Claims paid by the run
    pub claims_paid: usize,
}

/// Run the full pipeline for `manifest_path` on a simulated chain.
pub async fn run(
    mut config: PipelineConfig,
    manifest_path: &Path,
    holder_stake: u64,
) -> Result<Simulation> {
    config.validate()?;
    let manifest = MerkleManifest::load(manifest_path)?;
    let chain_id = config.network_config()?.chain_id;
    let sender = config.sender()?;

    let chain = Arc::new(SimulatedChain::new(chain_id));
    let mut holders: Vec<(Address, Amount)> = vec![(sender, Amount::from(holder_stake))];
    for voter in &config.voters {
        if holders.iter().all(|(holder, _)| *holder != voter.address) {
            holders.push((voter.address, Amount::from(holder_stake)));
        }
    }
    let token = chain.deploy_token(sender, &holders);
    let dao = chain.deploy_dao(sender, token, manifest.total(), VotingSettings::default())?;
    info!(%token, voting = %dao.apps.voting, holders = holders.len(), "Simulated DAO deployed");

    // Every run starts from a fresh record beside the real ones
    config.state_dir = config.state_dir.join(SIMULATED_STATE_DIR);
    let manifest_file = std::fs::canonicalize(manifest_path)
        .with_context(|| format!("Failed to resolve {}", manifest_path.display()))?;
    let mut state = NetworkState::new();
    dao.record_into(&mut state)?;
    state.set_path(
        &keys::merkle_file(&config.airdrop_id),
        manifest_file.display().to_string(),
    )?;
    let store = NetworkStateStore::new(config.state_dir.clone());
    {
        let _lock = store.lock(&config.network)?;
        store.persist(&config.network, chain_id, &state)?;
    }

    let ctx = StageContext::connect(
        config,
        chain.clone() as Arc<dyn LedgerEffects>,
        chain.clone() as Arc<dyn GovernanceAdapter>,
    )
    .await?;

    let distributor = deploy(&ctx).await?.address();
    println!("Distributor: {distributor}");
    let mut simulation = Simulation {
        chain: chain.clone(),
        token,
        distributor,
        claims_paid: 0,
    };

    let proposed = propose(&ctx).await?;
    println!("Proposal: {}", proposed.id());

    let voted = vote(&ctx).await?;
    println!(
        "Votes cast: {} (yea {}, nay {}, {:?})",
        voted.votes_cast, voted.status.yea, voted.status.nay, voted.status.phase
    );

    match execute(&ctx).await {
        Ok(outcome) => println!("Distributor balance: {}", outcome.distributor_balance),
        Err(StageError::AlreadyExecuted { proposal }) if voted.status.executed() => {
            println!("Proposal {proposal} executed by the deciding vote");
        }
        Err(e) if !e.is_fatal() => {
            warn!(error = %e, "Stopping before claims");
            println!("Stopped: {e}");
            return Ok(simulation);
        }
        Err(e) => return Err(e.into()),
    }

    let summary = claim_all(&ctx).await?;
    for receipt in &summary.claimed {
        println!(
            "Claimed #{} {} -> {}",
            receipt.index, receipt.amount, receipt.account
        );
    }
    println!(
        "Claims: {} paid, {} already claimed, {} transactions",
        summary.claimed.len(),
        summary.already_claimed.len(),
        chain.tx_count()
    );
    simulation.claims_paid = summary.claimed.len();
    Ok(simulation)
}
