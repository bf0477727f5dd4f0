//! scalehubd — the scalehub daemon.
//!
//! Assembles the autoscaler store and its backends:
//! - Provider registry (built-in providers)
//! - Storage sync (seed + periodic reconcile)
//! - Scale observer (writes observed scale back through the status sink)
//! - Watch logger
//!
//! # Usage
//!
//! ```text
//! scalehubd run --config /etc/scalehub/scalehub.toml
//! scalehubd check --config scalehub.toml
//! ```

mod controller;
mod observer;
mod watch_log;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use scalehub_core::ControllerConfig;
use scalehub_providers::{Backends, ProviderRegistry};
use scalehub_state::NAMESPACE_ALL;
use tokio::sync::watch;
use tracing::info;

use crate::controller::Controller;

#[derive(Parser)]
#[command(name = "scalehubd", about = "scalehub autoscaler daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the controller until interrupted.
    Run {
        /// Path to the controller config.
        #[arg(long)]
        config: PathBuf,

        /// Override the configured worker count.
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Load and validate a config, resolve its providers, and print the
    /// autoscalers it declares.
    Check {
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Command::Run { config, workers } => run(&config, workers).await,
        Command::Check { config } => check(&config).await,
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,scalehub=debug,scalehubd=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: &Path, workers: Option<usize>) -> anyhow::Result<ControllerConfig> {
    let mut config = ControllerConfig::from_file(path)?;
    if let Some(workers) = workers {
        config.workers = workers;
        config.validate()?;
    }
    info!(path = %path.display(), "config loaded");
    Ok(config)
}

async fn run(path: &Path, workers: Option<usize>) -> anyhow::Result<()> {
    info!("scalehub daemon starting");

    let config = load_config(path, workers)?;
    let registry = ProviderRegistry::builtin()?;
    let controller = Controller::new(&registry, config)?;

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = controller.start(shutdown_rx);

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    for handle in handles {
        let _ = handle.await;
    }

    info!("scalehub daemon stopped");
    Ok(())
}

async fn check(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path, None)?;
    let registry = ProviderRegistry::builtin()?;
    let backends = Backends::resolve(&registry, &config)?;
    let store = backends.object_store(&config);
    backends.storage_sync(store.clone()).sync_once().await?;

    let views = store.list(NAMESPACE_ALL);
    println!("{}", serde_json::to_string_pretty(&views)?);
    info!(autoscalers = views.len(), "config ok");
    Ok(())
}
