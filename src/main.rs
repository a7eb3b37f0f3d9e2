use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use topup::balance::{BalanceKey, fetch_balances};
use topup::config::SessionConfig;
use topup::diagnostics;
use topup::replay::{ReplayError, ReplayScript, run_replay};
use topup::rpc::{JsonRpcClient, RpcError};
use topup::seed::{InitialState, SeedError};
use topup::signal::SessionHandle;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error(transparent)]
    Replay(#[from] ReplayError),
    #[error(transparent)]
    Seed(#[from] SeedError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "topup", about = "TopupGo wallet session tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a session trace script against the scripted SDK.
    Replay { script: PathBuf },
    /// Decode the session seed from a `Cookie` header.
    Seed {
        #[arg(long, env = "TOPUP_COOKIE")]
        cookie: String,
    },
    /// Query native and USDC balances over JSON-RPC.
    Balance {
        #[arg(long)]
        address: String,
        #[arg(long, default_value_t = topup::config::DEFAULT_REQUIRED_CHAIN_ID)]
        chain_id: u64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    let config = SessionConfig::from_env();
    let _log_guard = diagnostics::install(&config.log_suppress);

    let cli = Cli::parse();
    match cli.command {
        Command::Replay { script } => run_replay_command(&config, script).await,
        Command::Seed { cookie } => run_seed(&config, &cookie),
        Command::Balance { address, chain_id } => run_balance(&config, address, chain_id).await,
    }
}

async fn run_replay_command(config: &SessionConfig, path: PathBuf) -> Result<(), CliError> {
    let raw = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| CliError::Read { path: path.clone(), source })?;
    let script = ReplayScript::from_json(&raw)?;
    tracing::info!(path = %path.display(), steps = script.steps.len(), "replaying session trace");
    let report = run_replay(script, config).await?;
    print_json(&report)
}

fn run_seed(config: &SessionConfig, cookie: &str) -> Result<(), CliError> {
    let seed = InitialState::try_from_cookie_header(Some(cookie), &config.session_cookie)?;
    print_json(&seed)
}

async fn run_balance(config: &SessionConfig, address: String, chain_id: u64) -> Result<(), CliError> {
    let client = JsonRpcClient::new(config.rpc_endpoints.clone())?;
    let key = BalanceKey { provider: SessionHandle::new("cli"), address, chain_id };
    let view = fetch_balances(&client, &key).await;
    print_json(&view)
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
