//! Storage sync mirror - keeps a local state file in step with the casino server.
//!
//! Usage:
//!   cargo run --release --bin casino-sync -- --url http://127.0.0.1:8000 --state-file local.json
//!   cargo run --release --bin casino-sync -- --state-file local.json --once

use anyhow::{Context, Result};
use casino_client::{Client, LocalStore, SyncConfig, SyncMirror};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Mirror local casino state to the storage API")]
struct Args {
    #[arg(short, long, default_value = "http://127.0.0.1:8000")]
    url: String,

    /// JSON file holding local key/value state (memory only when omitted).
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Milliseconds between full reconciliation passes.
    #[arg(long, default_value = "5000")]
    interval_ms: u64,

    /// Milliseconds between the initial pull and the first push.
    #[arg(long, default_value = "500")]
    initial_delay_ms: u64,

    /// Pull and push once, then exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let client = Client::new(&args.url).context("invalid server URL")?;
    let store = match &args.state_file {
        Some(path) => LocalStore::open(path)
            .with_context(|| format!("failed to open state file {}", path.display()))?,
        None => LocalStore::in_memory(),
    };
    let mirror = SyncMirror::new(client, Arc::new(Mutex::new(store))).with_config(SyncConfig {
        initial_delay: Duration::from_millis(args.initial_delay_ms),
        interval: Duration::from_millis(args.interval_ms.max(1)),
    });

    if args.once {
        let pulled = mirror.pull_initial().await;
        let report = mirror.reconcile().await;
        info!(pulled, pushed = report.pushed, failed = report.failed, "sync complete");
        if report.failed > 0 {
            anyhow::bail!("{} keys failed to push", report.failed);
        }
        return Ok(());
    }

    info!(url = %args.url, "starting sync mirror");
    mirror
        .run(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(?err, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await;
    Ok(())
}
