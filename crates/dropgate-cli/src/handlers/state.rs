//! State Command Handlers

use crate::commands::StateCommand;
use anyhow::Result;
use dropgate_pipeline::PipelineConfig;
use dropgate_store::{NetworkState, NetworkStateStore};

/// Dispatch a `state` subcommand.
pub fn handle(cmd: StateCommand, config: &PipelineConfig) -> Result<()> {
    let state = read(config)?;
    match cmd {
        StateCommand::Show => {
            println!("{}", state.to_json_pretty());
        }
        StateCommand::Require { keys } => {
            state.require(keys.as_slice())?;
            println!("All {} keys present for {}", keys.len(), config.network);
        }
        StateCommand::Ready { stage } => {
            state.require(stage.required_keys(&config.airdrop_id).as_slice())?;
            println!("{} can run {stage} for {}", config.network, config.airdrop_id);
        }
    }
    Ok(())
}

fn read(config: &PipelineConfig) -> Result<NetworkState> {
    let chain_id = config.network_config()?.chain_id;
    let store = NetworkStateStore::new(config.state_dir.clone());
    Ok(store.read(&config.network, chain_id)?)
}
