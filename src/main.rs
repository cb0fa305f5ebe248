//! Safe Module CLI - manage a Gnosis Safe and its DutchX module
//!
//! # WARNING
//! - Owner and threshold changes can lock you out of the Safe.
//! - Operations execute one by one; a failure mid-batch leaves earlier
//!   operations committed. Re-run the command to converge.

use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

// Use the library crate
use safe_module_cli::cli::commands;
use safe_module_cli::cli::{Context, RunOptions};
use safe_module_cli::config::{Config, DEFAULT_CONF_PATH};
use safe_module_cli::executor::ExecutionMode;
use safe_module_cli::Error;
use safe_module_cli::safe::{RpcChain, SafeChain};

/// Safe Module CLI - reconcile a Safe and its DutchX module with a config file
#[derive(Parser)]
#[command(name = "safe-module")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, env = "SAFE_MODULE_CONF", default_value = DEFAULT_CONF_PATH, global = true)]
    conf: PathBuf,

    /// Skip confirmation prompts
    #[arg(short, long, global = true)]
    yes: bool,

    /// Plan only, don't sign or submit anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the Safe and module state
    Status,

    /// Update Safe owners and threshold to match the configuration
    UpdateOwners,

    /// Update module operators to match the configuration
    UpdateOperators,

    /// Update module whitelisted tokens to match the configuration
    UpdateTokens,

    /// Update owners, threshold, operators and tokens in one batch
    Sync,

    /// Withdraw tokens from the exchange and the Safe to an address
    Withdraw {
        /// Token address
        #[arg(long)]
        token: Address,

        /// Amount in token units, e.g. 10.5
        #[arg(long)]
        amount: String,

        /// Destination address
        #[arg(long)]
        to: Address,
    },

    /// Execute an arbitrary call from the Safe
    SafeTx {
        /// Call target
        #[arg(long)]
        to: Address,

        /// Ether to send
        #[arg(long, default_value = "0")]
        amount: String,

        /// Hex calldata
        #[arg(long, default_value = "0x")]
        data: String,
    },

    /// Enable the configured module on the Safe
    EnableModule,

    /// Deploy a new Safe and module; addresses are saved to the config file
    Create,

    /// Deploy a new module for the existing Safe; the address is saved to the config file
    UpdateModule,

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("safe_module_cli=info"));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }

    if let Err(e) = run(cli).await {
        error!("Command failed: {:#}", e);
        match e.downcast_ref::<Error>() {
            Some(err) if !err.is_fatal() => warn!(
                "Committed operations stay committed; run the command again to reconcile the rest"
            ),
            Some(err) if err.is_insufficient_authority() => warn!("Nothing was submitted"),
            _ => {}
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    // Load configuration
    let config = Config::load(&cli.conf)?;

    if let Commands::Config = cli.command {
        return commands::show_config(&config);
    }

    let mode = ExecutionMode::from_env()?;
    let signers = mode.signers().map(|s| s.as_slice()).unwrap_or(&[]);
    let chain: Arc<dyn SafeChain> = Arc::new(RpcChain::connect(&config.ethereum_url, signers)?);

    let mut ctx = Context {
        config,
        conf_path: cli.conf,
        chain,
        mode,
    };
    let opts = RunOptions {
        yes: cli.yes,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Status => commands::status(&ctx).await,
        Commands::UpdateOwners => commands::update_owners(&ctx, opts).await,
        Commands::UpdateOperators => commands::update_operators(&ctx, opts).await,
        Commands::UpdateTokens => commands::update_tokens(&ctx, opts).await,
        Commands::Sync => commands::sync(&ctx, opts).await,
        Commands::Withdraw { token, amount, to } => {
            commands::withdraw(&ctx, opts, token, &amount, to).await
        }
        Commands::SafeTx { to, amount, data } => {
            commands::safe_tx(&ctx, opts, to, &amount, &data).await
        }
        Commands::EnableModule => commands::enable_module(&ctx, opts).await,
        Commands::Create => commands::create(&mut ctx, opts).await,
        Commands::UpdateModule => commands::update_module(&mut ctx, opts).await,
        Commands::Config => commands::show_config(&ctx.config),
    }
}
