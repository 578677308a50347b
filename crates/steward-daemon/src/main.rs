//! steward-daemon - claim dispatch daemon.
//!
//! Loads configuration, opens the on-disk vault, registers the built-in
//! stakeholder manifest, and runs the dispatch engine until SIGINT or
//! SIGTERM. Shutdown is cooperative: in-flight dispatch cycles drain
//! before the process exits.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use steward_core::{Engine, FsVault, ProjectRoster, Vault};
use steward_daemon::config::StewardConfig;
use steward_daemon::stk;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "steward-daemon", version, about = "Claim dispatch daemon")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "steward.toml")]
    config: PathBuf,

    /// Override the configured data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log filter directive, e.g. `info` or `steward_core=debug`.
    #[arg(long, env = "STEWARD_LOG", default_value = "info")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log_filter).context("invalid log filter")?)
        .init();

    let mut config = if args.config.exists() {
        StewardConfig::from_file(&args.config)
            .with_context(|| format!("loading {}", args.config.display()))?
    } else {
        warn!(path = %args.config.display(), "Configuration file not found; using defaults");
        StewardConfig::default()
    };
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    config.engine.validate().context("invalid engine configuration")?;

    let vault = Arc::new(FsVault::open(&config.data_dir)?);
    let registry = Arc::new(stk::manifest()?);
    info!(
        data_dir = %config.data_dir.display(),
        stakeholders = registry.len(),
        "Daemon starting"
    );

    let engine = Engine::new(
        registry,
        Arc::clone(&vault) as Arc<dyn Vault>,
        vault as Arc<dyn ProjectRoster>,
        config.engine,
    );

    let shutdown = engine.shutdown_handle();
    tokio::spawn(async move {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installs");
        let mut int = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("SIGINT handler installs");
        tokio::select! {
            _ = term.recv() => info!("SIGTERM received; shutting down"),
            _ = int.recv() => info!("SIGINT received; shutting down"),
        }
        shutdown.store(true, Ordering::Relaxed);
    });

    engine.run().await;
    info!("Daemon stopped");
    Ok(())
}
