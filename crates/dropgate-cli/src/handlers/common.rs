//! Config loading shared by the handlers.

use anyhow::{Context, Result};
use dropgate_core::Address;
use dropgate_pipeline::PipelineConfig;
use std::path::Path;

/// Values given on the command line; these beat the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--network`
    pub network: Option<String>,
    /// `--from`
    pub from: Option<Address>,
}

/// Load the config file, then apply environment and command-line overrides.
///
/// Validation is left to the caller; read-only commands do not need a sender.
pub fn load_config(path: &Path, overrides: &Overrides) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load_from_file(path)?;
    config
        .merge_with_env()
        .context("Failed to apply DROPGATE_* overrides")?;
    if let Some(network) = &overrides.network {
        config.network = network.clone();
    }
    if let Some(from) = overrides.from {
        config.from = Some(from);
    }
    Ok(config)
}
