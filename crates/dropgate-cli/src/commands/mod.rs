//! Subcommand definitions.

use clap::{Args, Subcommand};
use dropgate_pipeline::Stage;
use std::path::PathBuf;

/// State record commands.
#[derive(Debug, Clone, Subcommand)]
pub enum StateCommand {
    /// Print the selected network's state record
    Show,

    /// Fail unless every given key is present
    Require {
        /// Dotted key paths, e.g. `airdrop-1.voteId`
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Fail unless the record holds every key a stage reads
    Ready {
        /// Stage name: deploy, propose, vote, execute, or claim
        stage: Stage,
    },
}

/// Arguments of `simulate`.
#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    /// Manifest to distribute
    #[arg(long)]
    pub manifest: PathBuf,

    /// Governance tokens given to the sender and each configured voter
    #[arg(long, default_value = "1000")]
    pub holder_stake: u64,
}
