//! `wave-portal`: wave at a WavePortal deployment from the terminal.

#[macro_use]
extern crate tracing;

use std::{path::PathBuf, sync::Arc};

use alloy_primitives::Address;
use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use tracing_subscriber::{EnvFilter, prelude::*};
use wave_portal::{
    SessionController, SessionSnapshot, UserIntent, WavePortalConfig, WaveRecord,
    rpc::{self, RpcContractBinder, RpcWalletProvider},
};
use yansi::Paint;

/// Wave at a WavePortal contract and watch the waves come in.
#[derive(Debug, Parser)]
#[command(name = "wave-portal", version, next_display_order = None)]
struct Args {
    /// Directory containing `wave.toml`.
    #[arg(long, value_name = "PATH", default_value = ".", global = true)]
    root: PathBuf,

    /// The JSON-RPC endpoint, overrides `rpc_url` from the config.
    #[arg(long, short, value_name = "URL", global = true)]
    rpc_url: Option<String>,

    /// The WavePortal deployment, overrides `contract_address` from the config.
    #[arg(long, value_name = "ADDRESS", global = true)]
    contract: Option<Address>,

    /// Print session snapshots as JSON.
    #[arg(long, short, global = true)]
    json: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print every wave sent so far and the total count.
    #[command(visible_alias = "ls")]
    List,

    /// Print every wave, then keep printing new ones until interrupted.
    #[command(visible_alias = "w")]
    Watch,

    /// Send a wave and wait for it to be mined.
    #[command(visible_alias = "s")]
    Send {
        /// The message to send.
        message: String,
    },
}

fn main() -> Result<()> {
    subscriber();
    let args = Args::parse();
    run(args)
}

/// Logs to stderr, filtered by `RUST_LOG`.
fn subscriber() {
    tracing_subscriber::Registry::default()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init()
}

#[tokio::main]
async fn run(args: Args) -> Result<()> {
    let mut config = WavePortalConfig::load_with_root(&args.root)
        .wrap_err_with(|| format!("failed to load config from {}", args.root.display()))?;
    if let Some(rpc_url) = args.rpc_url {
        config.rpc_url = rpc_url;
    }
    if let Some(contract) = args.contract {
        config.contract_address = contract;
    }
    debug!(?config, "loaded config");

    let provider = rpc::connect_http(&config)?;
    let wallet = Arc::new(RpcWalletProvider::new(provider.clone()));
    let binder = Arc::new(RpcContractBinder::new(provider, &config));
    let mut session = SessionController::from_config(wallet, binder, &config);

    session.startup().await;
    if !session.state().is_connected() {
        session.handle_intent(UserIntent::ConnectRequested).await;
    }
    if !session.state().is_connected() {
        match session.last_error() {
            Some(err) => eyre::bail!("{err}"),
            None => eyre::bail!("wallet is not connected"),
        }
    }

    let printer = Printer { json: args.json };
    match args.cmd {
        Command::List => printer.snapshot(&session.snapshot())?,
        Command::Watch => {
            printer.snapshot(&session.snapshot())?;
            let ledger = session.ledger();
            let mut updates = session.updates();
            let mut shown = ledger.read().len();
            loop {
                tokio::select! {
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let fresh = ledger.read().all()[shown..].to_vec();
                        shown += fresh.len();
                        for wave in &fresh {
                            printer.wave(wave)?;
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            session.handle_intent(UserIntent::DisconnectRequested).await;
        }
        Command::Send { message } => {
            session.handle_intent(UserIntent::SubmitRequested(message)).await;
            printer.snapshot(&session.snapshot())?;
            if let Some(err) = session.last_error() {
                eyre::bail!("{err}");
            }
            if let Some(delta) = session.tracker().count_delta() {
                printer.note(&format!("total waves grew by {delta}"));
            }
        }
    }

    Ok(())
}

struct Printer {
    json: bool,
}

impl Printer {
    fn snapshot(&self, snapshot: &SessionSnapshot) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(snapshot)?);
            return Ok(());
        }

        match snapshot.state.account {
            Some(account) => println!("{} {}", "account:".bold(), account.cyan()),
            None => println!("{} {:?}", "account:".bold(), snapshot.state.connection_phase),
        }
        if let Some(count) = snapshot.state.total_wave_count {
            println!("{} {count}", "total waves:".bold());
        }
        for wave in &snapshot.waves {
            self.wave(wave)?;
        }
        if let Some(pending) = &snapshot.pending {
            self.note(&format!("transaction {} is still {:?}", pending.id(), pending.state()));
        }
        if let Some(err) = &snapshot.last_error {
            eprintln!("{} {err}", "error:".red().bold());
        }
        Ok(())
    }

    fn wave(&self, wave: &WaveRecord) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(wave)?);
            return Ok(());
        }
        let when = wave
            .timestamp()
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        println!("{} {} {}", when.dim(), wave.sender().green(), wave.message());
        Ok(())
    }

    fn note(&self, note: &str) {
        if !self.json {
            println!("{}", note.yellow());
        }
    }
}
