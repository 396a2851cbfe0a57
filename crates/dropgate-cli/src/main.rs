//! Dropgate operator CLI
//!
//! Builds and checks airdrop manifests, inspects the per-network state record,
//! and runs the whole pipeline against the in-process simulator.

use anyhow::Result;
use clap::{Parser, Subcommand};
use dropgate_core::Address;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod handlers;

use commands::{SimulateArgs, StateCommand};
use handlers::common::Overrides;

#[derive(Parser)]
#[command(name = "dropgate")]
#[command(about = "Dropgate - governance-gated Merkle airdrops", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = "dropgate.toml")]
    config: PathBuf,

    /// Network to operate on, overriding config and DROPGATE_NETWORK
    #[arg(long, global = true)]
    network: Option<String>,

    /// Transaction sender, overriding config and DROPGATE_FROM
    #[arg(long, global = true)]
    from: Option<Address>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a manifest from an account → amount balance map
    BuildManifest {
        /// JSON object of account to amount (decimal or 0x hex)
        #[arg(long)]
        balances: PathBuf,

        /// Manifest file to write
        #[arg(long)]
        output: PathBuf,
    },

    /// Rebuild a manifest's tree and check its root, total and proofs
    VerifyManifest {
        /// Manifest file to check
        #[arg(long)]
        manifest: PathBuf,
    },

    /// Inspect the network state record
    #[command(subcommand)]
    State(StateCommand),

    /// Run all five stages against a simulated chain
    Simulate(SimulateArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let overrides = Overrides {
        network: cli.network,
        from: cli.from,
    };

    match cli.command {
        Commands::BuildManifest { balances, output } => {
            handlers::manifest::build(&balances, &output)?;
        }

        Commands::VerifyManifest { manifest } => {
            handlers::manifest::verify(&manifest)?;
        }

        Commands::State(cmd) => {
            let config = handlers::common::load_config(&cli.config, &overrides)?;
            handlers::state::handle(cmd, &config)?;
        }

        Commands::Simulate(args) => {
            let config = handlers::common::load_config(&cli.config, &overrides)?;
            handlers::simulate::run(config, &args.manifest, args.holder_stake).await?;
        }
    }

    Ok(())
}
