//! Explicit per-run context passed to every stage.

use crate::config::PipelineConfig;
use crate::errors::{Result, StageError};
use crate::keys;
use crate::stages::Stage;
use dropgate_core::{Address, GovernanceAdapter, LedgerEffects, LedgerError, VerifiedManifest};
use dropgate_store::{NetworkState, NetworkStateStore, StateLock};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Ledger handles, state store and settings for one pipeline run.
///
/// Built once by [`StageContext::connect`], which checks that the ledger is on
/// the configured chain before any stage can touch the state record.
pub struct StageContext {
    ledger: Arc<dyn LedgerEffects>,
    governance: Arc<dyn GovernanceAdapter>,
    store: NetworkStateStore,
    config: PipelineConfig,
    sender: Address,
    chain_id: u64,
    timeout: Duration,
}

impl StageContext {
    /// Validate `config` and confirm the ledger's chain id.
    pub async fn connect(
        config: PipelineConfig,
        ledger: Arc<dyn LedgerEffects>,
        governance: Arc<dyn GovernanceAdapter>,
    ) -> Result<Self> {
        config.validate()?;
        let chain_id = config.network_config()?.chain_id;
        let sender = config.sender()?;
        let ctx = Self {
            ledger,
            governance,
            store: NetworkStateStore::new(config.state_dir.clone()),
            timeout: config.timeout(),
            config,
            sender,
            chain_id,
        };

        let actual = ctx.call("chain_id", ctx.ledger.chain_id()).await?;
        if actual != chain_id {
            return Err(StageError::ChainMismatch {
                network: ctx.config.network.clone(),
                expected: chain_id,
                actual,
            });
        }
        debug!(network = %ctx.config.network, chain_id, "Connected");
        Ok(ctx)
    }

    /// Ledger effects handler.
    pub fn ledger(&self) -> &dyn LedgerEffects {
        self.ledger.as_ref()
    }

    /// Governance handler.
    pub fn governance(&self) -> &dyn GovernanceAdapter {
        self.governance.as_ref()
    }

    /// Run configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Selected network name.
    pub fn network(&self) -> &str {
        &self.config.network
    }

    /// Airdrop this run operates on.
    pub fn airdrop_id(&self) -> &str {
        &self.config.airdrop_id
    }

    /// Chain id the state record is keyed by.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Transaction sender.
    pub fn sender(&self) -> Address {
        self.sender
    }

    /// State store.
    pub fn store(&self) -> &NetworkStateStore {
        &self.store
    }

    /// Take the network's exclusive state lock.
    pub fn lock_state(&self) -> Result<StateLock> {
        Ok(self.store.lock(self.network())?)
    }

    /// Read the network record.
    pub fn read_state(&self) -> Result<NetworkState> {
        Ok(self.store.read(self.network(), self.chain_id)?)
    }

    /// Read the network record and assert the keys `stage` depends on.
    pub fn read_state_for(&self, stage: Stage) -> Result<NetworkState> {
        let state = self.read_state()?;
        state.require(stage.required_keys(self.airdrop_id()).as_slice())?;
        Ok(state)
    }

    /// Write the network record back.
    pub fn persist_state(&self, state: &NetworkState) -> Result<()> {
        Ok(self.store.persist(self.network(), self.chain_id, state)?)
    }

    /// Load and verify the airdrop's manifest named in `state`.
    pub fn load_manifest(&self, state: &NetworkState) -> Result<VerifiedManifest> {
        let recorded = state.get_str(&keys::merkle_file(self.airdrop_id()))?;
        let path = self.config.resolve(recorded);
        Ok(dropgate_core::MerkleManifest::load(&path)?)
    }

    /// Await a ledger call, bounded by the network timeout.
    pub async fn call<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, LedgerError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(StageError::Ledger { operation, source }),
            Err(_) => Err(StageError::Timeout {
                operation,
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

impl std::fmt::Debug for StageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("network", &self.config.network)
            .field("airdrop_id", &self.config.airdrop_id)
            .field("chain_id", &self.chain_id)
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}
