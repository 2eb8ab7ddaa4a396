//! Cosmos
//!
//! Watches a project for fixture files, keeps the generated modules file
//! current and serves the playground.

use anyhow::Context;
use clap::Parser;
use cosmos_common::config::CONFIG_FILE_NAME;
use cosmos_common::CosmosConfig;
use cosmos_web::SyncServer;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "cosmos")]
#[command(about = "Cosmos - component fixture playground")]
#[command(version)]
struct Cli {
    /// Configuration file path (defaults to <root>/cosmos.toml)
    #[arg(short, long, env = "COSMOS_CONFIG")]
    config: Option<PathBuf>,

    /// Project root
    #[arg(short, long, env = "COSMOS_ROOT")]
    root: Option<PathBuf>,

    /// Sync server port
    #[arg(short, long, env = "COSMOS_PORT")]
    port: Option<u16>,

    /// Sync server hostname
    #[arg(long, env = "COSMOS_HOSTNAME")]
    hostname: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<CosmosConfig> {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => std::env::current_dir()?,
        };
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| root.join(CONFIG_FILE_NAME));

        let mut config = if path.exists() {
            CosmosConfig::load(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?
        } else {
            if self.config.is_some() {
                warn!("Config file {} not found, using defaults", path.display());
            }
            CosmosConfig::for_root(root)?
        };

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(hostname) = &self.hostname {
            config.hostname = Some(hostname.clone());
        }
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    info!("Cosmos v{}", cosmos_common::VERSION);

    let config = cli.load_config()?;
    info!("Project root: {}", config.root_path.display());

    let registry = cosmos_registry::start(config.clone())
        .await
        .context("Failed to start fixture registry")?;
    info!(
        "Found {} fixture files",
        registry.initial_manifest().fixture_files.len()
    );

    let server = SyncServer::new(&config);
    let forwarder = server.forward_registry_updates(registry.subscribe());

    let result = tokio::select! {
        result = server.serve(config.bind_host(), config.port) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    };

    forwarder.abort();
    registry.shutdown();
    result
}
