//! Full airdrop runs against the simulated chain.

#![allow(clippy::unwrap_used)]

use assert_matches::assert_matches;
use dropgate_core::{
    Address, Amount, Entitlement, EntitlementSet, GovernanceAdapter, LedgerEffects, LedgerError,
    MerkleManifest, ProposalId, ProposalPhase,
};
use dropgate_pipeline::{
    claim, claim_all, deploy, execute, propose, vote, DeployOutcome, NetworkConfig,
    PipelineConfig, ProposeOutcome, StageContext, StageError, VoterConfig,
};
use dropgate_simulator::{DaoDeployment, SimulatedChain, VotingSettings};
use dropgate_store::{NetworkState, NetworkStateStore, StateError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const CHAIN_ID: u64 = 1337;
const NETWORK: &str = "local";
const AIRDROP: &str = "airdrop-1";

fn addr(b: u8) -> Address {
    Address::from_bytes([b; 20])
}

/// Operator holds 10, holders 2 and 3 hold 30 and 40, the vault 20.
/// The airdrop pays 5 to 0xa and 7 to 0xb.
struct Fixture {
    dir: TempDir,
    chain: Arc<SimulatedChain>,
    dao: DaoDeployment,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let chain = Arc::new(SimulatedChain::new(CHAIN_ID));
        let token = chain.deploy_token(
            addr(0xd0),
            &[
                (addr(1), Amount::from(10u64)),
                (addr(2), Amount::from(30u64)),
                (addr(3), Amount::from(40u64)),
            ],
        );
        let dao = chain
            .deploy_dao(addr(0xd0), token, Amount::from(20u64), VotingSettings::default())
            .unwrap();

        let set = EntitlementSet::new(vec![
            Entitlement::new(0, addr(0xa), 5u64),
            Entitlement::new(1, addr(0xb), 7u64),
        ])
        .unwrap();
        MerkleManifest::from_set(&set)
            .save(&dir.path().join("airdrop-1.json"))
            .unwrap();

        let fixture = Self { dir, chain, dao };
        let mut state = NetworkState::new();
        dao.record_into(&mut state).unwrap();
        state.set_path("airdrop-1.merkleFile", "airdrop-1.json").unwrap();
        fixture.store().persist(NETWORK, CHAIN_ID, &state).unwrap();
        fixture
    }

    fn store(&self) -> NetworkStateStore {
        NetworkStateStore::new(self.dir.path().join("state"))
    }

    fn state(&self) -> NetworkState {
        self.store().read(NETWORK, CHAIN_ID).unwrap()
    }

    fn config(&self) -> PipelineConfig {
        let mut networks = BTreeMap::new();
        networks.insert(
            NETWORK.to_string(),
            NetworkConfig {
                chain_id: CHAIN_ID,
                timeout_ms: 1_000,
            },
        );
        PipelineConfig {
            network: NETWORK.to_string(),
            airdrop_id: AIRDROP.to_string(),
            state_dir: self.dir.path().join("state"),
            base_dir: self.dir.path().to_path_buf(),
            from: Some(addr(1)),
            force_redeploy: false,
            execute_if_decided: false,
            idempotent_claims: false,
            voters: vec![
                VoterConfig {
                    address: addr(2),
                    support: true,
                },
                VoterConfig {
                    address: addr(3),
                    support: true,
                },
            ],
            networks,
        }
    }

    async fn context(&self) -> StageContext {
        self.context_with(self.config()).await
    }

    async fn context_with(&self, config: PipelineConfig) -> StageContext {
        StageContext::connect(
            config,
            self.chain.clone() as Arc<dyn LedgerEffects>,
            self.chain.clone() as Arc<dyn GovernanceAdapter>,
        )
        .await
        .unwrap()
    }

    fn balance(&self, account: Address) -> Amount {
        self.chain.token_balance(self.dao.token, account).unwrap()
    }
}

#[tokio::test]
async fn full_airdrop_run() {
    let fx = Fixture::new();
    let ctx = fx.context().await;

    let deployed = deploy(&ctx).await.unwrap();
    assert_matches!(deployed, DeployOutcome::Deployed(_));
    let distributor = deployed.address();
    assert_eq!(
        fx.state()
            .get_address("airdrop-1.merkleDistributorAddress")
            .unwrap(),
        distributor
    );

    let proposed = propose(&ctx).await.unwrap();
    assert_matches!(
        &proposed,
        ProposeOutcome::Proposed { supply_share, amount, .. }
            if supply_share == "12.00%" && *amount == Amount::from(12u64)
    );
    assert_eq!(fx.state().get_u64("airdrop-1.voteId").unwrap(), proposed.id().0);

    let voted = vote(&ctx).await.unwrap();
    assert_eq!(voted.votes_cast, 2);
    assert_eq!(voted.status.phase, ProposalPhase::Passed);

    let executed = execute(&ctx).await.unwrap();
    assert_eq!(executed.distributor, distributor);
    assert_eq!(executed.distributor_balance, Amount::from(12u64));
    assert_eq!(fx.balance(fx.dao.vault), Amount::from(8u64));

    let summary = claim_all(&ctx).await.unwrap();
    assert_eq!(summary.claimed.len(), 2);
    assert!(summary.already_claimed.is_empty());
    assert_eq!(fx.balance(addr(0xa)), Amount::from(5u64));
    assert_eq!(fx.balance(addr(0xb)), Amount::from(7u64));
    assert_eq!(fx.balance(distributor), Amount::zero());
}

#[tokio::test]
async fn rerunning_stages_changes_nothing() {
    let fx = Fixture::new();
    let ctx = fx.context().await;
    let distributor = deploy(&ctx).await.unwrap().address();
    let id = propose(&ctx).await.unwrap().id();
    let txs = fx.chain.tx_count();

    assert_eq!(deploy(&ctx).await.unwrap(), DeployOutcome::Existing(distributor));
    assert_eq!(propose(&ctx).await.unwrap(), ProposeOutcome::Existing(id));
    assert_eq!(fx.chain.tx_count(), txs);

    vote(&ctx).await.unwrap();
    execute(&ctx).await.unwrap();
    assert_matches!(
        execute(&ctx).await,
        Err(StageError::AlreadyExecuted { proposal }) if proposal == id
    );
    // Closed proposals are not voted on again
    assert_eq!(vote(&ctx).await.unwrap().votes_cast, 0);
}

#[tokio::test]
async fn distributor_from_crashed_run_is_adopted() {
    let fx = Fixture::new();
    let ctx = fx.context().await;
    let manifest = MerkleManifest::load(&fx.dir.path().join("airdrop-1.json")).unwrap();
    // Deployed on the ledger but never recorded
    let orphan = fx
        .chain
        .deploy_distributor(fx.dao.token, manifest.root(), addr(1))
        .await
        .unwrap();
    let txs = fx.chain.tx_count();

    assert_eq!(deploy(&ctx).await.unwrap(), DeployOutcome::Adopted(orphan));
    assert_eq!(fx.chain.tx_count(), txs);
    assert_eq!(
        fx.state()
            .get_address("airdrop-1.merkleDistributorAddress")
            .unwrap(),
        orphan
    );
}

#[tokio::test]
async fn mismatched_distributor_needs_force_redeploy() {
    let fx = Fixture::new();
    let bogus = fx.dao.apps.finance;
    fx.store()
        .update(NETWORK, CHAIN_ID, |state| {
            state.set_path("airdrop-1.merkleDistributorAddress", bogus.to_string())
        })
        .unwrap();

    let ctx = fx.context().await;
    assert_matches!(
        deploy(&ctx).await,
        Err(StageError::DistributorExists { address }) if address == bogus
    );

    let mut config = fx.config();
    config.force_redeploy = true;
    let ctx = fx.context_with(config).await;
    let outcome = deploy(&ctx).await.unwrap();
    assert_matches!(outcome, DeployOutcome::Deployed(a) if a != bogus);
}

#[tokio::test]
async fn forced_redeploy_funds_the_new_distributor() {
    let fx = Fixture::new();
    let ctx = fx.context().await;
    let first = deploy(&ctx).await.unwrap().address();
    assert_eq!(propose(&ctx).await.unwrap().id(), ProposalId(0));

    let set = EntitlementSet::new(vec![
        Entitlement::new(0, addr(0xa), 6u64),
        Entitlement::new(1, addr(0xb), 9u64),
    ])
    .unwrap();
    MerkleManifest::from_set(&set)
        .save(&fx.dir.path().join("airdrop-1.json"))
        .unwrap();

    let mut config = fx.config();
    config.force_redeploy = true;
    let ctx = fx.context_with(config).await;
    let second = deploy(&ctx).await.unwrap().address();
    assert_ne!(second, first);
    assert!(!fx.state().contains("airdrop-1.voteId"));

    let proposed = propose(&ctx).await.unwrap();
    assert_matches!(
        &proposed,
        ProposeOutcome::Proposed { id, amount, .. }
            if *id == ProposalId(1) && *amount == Amount::from(15u64)
    );
    vote(&ctx).await.unwrap();
    let executed = execute(&ctx).await.unwrap();
    assert_eq!(executed.distributor, second);
    assert_eq!(fx.balance(second), Amount::from(15u64));
    assert_eq!(fx.balance(first), Amount::zero());
}

#[tokio::test]
async fn execute_refuses_proposal_for_another_recipient() {
    let fx = Fixture::new();
    let ctx = fx.context().await;
    let distributor = deploy(&ctx).await.unwrap().address();
    let id = propose(&ctx).await.unwrap().id();
    vote(&ctx).await.unwrap();

    fx.store()
        .update(NETWORK, CHAIN_ID, |state| {
            state.set_path("airdrop-1.merkleDistributorAddress", addr(0x77).to_string())
        })
        .unwrap();
    let txs = fx.chain.tx_count();

    assert_matches!(
        execute(&ctx).await,
        Err(StageError::PaymentMismatch { proposal, recipient, expected_recipient, .. })
            if proposal == id && recipient == distributor && expected_recipient == addr(0x77)
    );
    assert_eq!(fx.chain.tx_count(), txs);
    assert_eq!(fx.balance(fx.dao.vault), Amount::from(20u64));
    assert_eq!(fx.balance(distributor), Amount::zero());
}

#[tokio::test]
async fn timed_out_deploy_persists_nothing() {
    let fx = Fixture::new();
    let mut config = fx.config();
    if let Some(network) = config.networks.get_mut(NETWORK) {
        network.timeout_ms = 20;
    }
    let ctx = fx.context_with(config).await;
    fx.chain.set_latency(Duration::from_millis(200));

    assert_matches!(
        deploy(&ctx).await,
        Err(StageError::Timeout { operation: "find_distributor", timeout_ms: 20 })
    );
    assert!(!fx.state().contains("airdrop-1.merkleDistributorAddress"));
    assert!(!fx.store().lock_path(NETWORK).unwrap().exists());

    fx.chain.set_latency(Duration::ZERO);
    assert_matches!(deploy(&ctx).await, Ok(DeployOutcome::Deployed(_)));
}

#[tokio::test]
async fn execute_before_majority_is_not_fatal() {
    let fx = Fixture::new();
    let mut config = fx.config();
    config.voters.clear();
    let ctx = fx.context_with(config).await;
    deploy(&ctx).await.unwrap();
    let id = propose(&ctx).await.unwrap().id();

    // Only the operator's 10 of 100 are behind it
    let voted = vote(&ctx).await.unwrap();
    assert_eq!(voted.votes_cast, 1);
    assert_eq!(voted.status.phase, ProposalPhase::Open);

    let err = execute(&ctx).await.unwrap_err();
    assert_matches!(err, StageError::NotExecutable { proposal } if proposal == id);
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn deciding_vote_executes_when_configured() {
    let fx = Fixture::new();
    let mut config = fx.config();
    config.execute_if_decided = true;
    config.voters.push(VoterConfig {
        address: addr(1),
        support: false,
    });
    let ctx = fx.context_with(config).await;
    let distributor = deploy(&ctx).await.unwrap().address();
    let id = propose(&ctx).await.unwrap().id();

    let voted = vote(&ctx).await.unwrap();
    // The third voter finds the proposal already executed
    assert_eq!(voted.votes_cast, 2);
    assert_eq!(voted.status.phase, ProposalPhase::Executed);
    assert_eq!(fx.balance(distributor), Amount::from(12u64));
    assert_matches!(
        execute(&ctx).await,
        Err(StageError::AlreadyExecuted { proposal }) if proposal == id
    );
}

#[tokio::test]
async fn claims_pay_once() {
    let fx = Fixture::new();
    let ctx = fx.context().await;
    deploy(&ctx).await.unwrap();
    propose(&ctx).await.unwrap();
    vote(&ctx).await.unwrap();
    execute(&ctx).await.unwrap();

    let receipt = claim(&ctx, addr(0xb)).await.unwrap();
    assert_eq!(receipt.index, 1);
    assert_eq!(receipt.amount, Amount::from(7u64));

    let err = claim(&ctx, addr(0xb)).await.unwrap_err();
    assert_matches!(err, StageError::AlreadyClaimed { index: 1 });
    assert!(!err.is_fatal());
    assert_eq!(fx.balance(addr(0xb)), Amount::from(7u64));

    assert_matches!(
        claim(&ctx, addr(0x55)).await,
        Err(StageError::NoEntitlement { account }) if account == addr(0x55)
    );

    // Index 1 is already paid
    assert_matches!(
        claim_all(&ctx).await,
        Err(StageError::AlreadyClaimed { index: 1 })
    );
    let mut config = fx.config();
    config.idempotent_claims = true;
    let ctx = fx.context_with(config).await;
    let summary = claim_all(&ctx).await.unwrap();
    assert_eq!(summary.already_claimed, vec![0, 1]);
    assert!(summary.claimed.is_empty());
}

#[tokio::test]
async fn claim_before_funding_fails_without_marking() {
    let fx = Fixture::new();
    let ctx = fx.context().await;
    let distributor = deploy(&ctx).await.unwrap().address();

    assert_matches!(
        claim(&ctx, addr(0xa)).await,
        Err(StageError::Ledger {
            operation: "claim",
            source: LedgerError::InsufficientBalance { .. }
        })
    );
    assert!(!fx.chain.is_claimed(distributor, 0).await.unwrap());
}

#[tokio::test]
async fn stages_report_every_missing_key() {
    let fx = Fixture::new();
    fx.store()
        .persist(NETWORK, CHAIN_ID, &NetworkState::new())
        .unwrap();
    let ctx = fx.context().await;

    let err = propose(&ctx).await.unwrap_err();
    match err {
        StageError::State(ref state_err @ StateError::MissingState { .. }) => {
            assert_eq!(
                state_err.missing_keys(),
                [
                    "daoTokenAddress",
                    "app:aragon-finance.proxyAddress",
                    "app:aragon-token-manager.proxyAddress",
                    "app:aragon-voting.proxyAddress",
                    "airdrop-1.merkleDistributorAddress",
                    "airdrop-1.merkleFile",
                ]
            );
        }
        other => panic!("unexpected: {other:?}"),
    }

    assert_matches!(
        vote(&ctx).await,
        Err(StageError::State(StateError::MissingState { .. }))
    );
}

#[tokio::test]
async fn wrong_chain_is_refused() {
    let fx = Fixture::new();
    let mut config = fx.config();
    if let Some(network) = config.networks.get_mut(NETWORK) {
        network.chain_id = 4;
    }
    let result = StageContext::connect(
        config,
        fx.chain.clone() as Arc<dyn LedgerEffects>,
        fx.chain.clone() as Arc<dyn GovernanceAdapter>,
    )
    .await;
    assert_matches!(
        result,
        Err(StageError::ChainMismatch {
            expected: 4,
            actual: CHAIN_ID,
            ..
        })
    );
}

#[tokio::test]
async fn proposal_ids_are_per_airdrop() {
    let fx = Fixture::new();
    let ctx = fx.context().await;
    deploy(&ctx).await.unwrap();
    let first = propose(&ctx).await.unwrap().id();
    assert_eq!(first, ProposalId(0));

    fx.store()
        .update(NETWORK, CHAIN_ID, |state| {
            state.set_path("airdrop-2.merkleFile", "airdrop-1.json")
        })
        .unwrap();
    let mut config = fx.config();
    config.airdrop_id = "airdrop-2".to_string();
    let ctx = fx.context_with(config).await;
    // Same manifest and sender, so the first distributor is adopted
    assert_matches!(deploy(&ctx).await, Ok(DeployOutcome::Adopted(_)));
    assert_eq!(propose(&ctx).await.unwrap().id(), ProposalId(1));
}
