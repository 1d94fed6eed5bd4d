use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

use statuswatch::api::ApiServer;
use statuswatch::config::MonitorConfig;
use statuswatch::engine::Monitor;
use statuswatch::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Check on every interval and serve the live view.
    Server,
    /// Run a single round and exit.
    Cli,
}

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the YAML (or .json) configuration file
    #[arg(short, long, env = "STATUSWATCH_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    #[arg(short, long, value_enum, default_value_t = Mode::Server)]
    mode: Mode,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    let config = MonitorConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    if cli.mode == Mode::Cli {
        let monitor = Monitor::new(config, None)?;
        monitor.run_round().await;
        return Ok(());
    }

    let store = Arc::new(Store::new());
    let mut server = ApiServer::new(Arc::clone(&store), config.api_port);
    if let Some(dir) = &config.static_dir {
        server = server.with_static_dir(dir);
    }
    let monitor = Arc::new(Monitor::new(config, Some(store))?);

    let api = tokio::spawn(server.serve());
    let engine = tokio::spawn(Arc::clone(&monitor).run());

    tokio::select! {
        res = api => res.context("API server task panicked")??,
        res = engine => res.context("Monitor task panicked")??,
        res = signal::ctrl_c() => {
            res.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received. Stopping health checker...");
        }
    }

    Ok(())
}
