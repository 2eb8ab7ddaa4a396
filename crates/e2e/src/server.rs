//! Server management - starting and health checking an in-process playground

use cosmos_common::CosmosConfig;
use cosmos_registry::RegistryHandle;
use cosmos_web::{SyncServer, HEALTH_PATH, SYNC_PATH};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// Throwaway project directory
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> E2eResult<Self> {
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the project root, creating parent directories
    pub fn write(&self, relative: &str, contents: &str) -> E2eResult<PathBuf> {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn config(&self) -> E2eResult<CosmosConfig> {
        Ok(CosmosConfig::for_root(self.root())?)
    }
}

/// Handle to a running registry plus sync server
pub struct ServerHandle {
    pub base_url: String,
    pub port: u16,
    pub config: CosmosConfig,
    registry: Option<RegistryHandle>,
    server: JoinHandle<()>,
    forwarder: JoinHandle<()>,
}

impl ServerHandle {
    /// Start the registry and serve it on a free local port
    pub async fn start(config: CosmosConfig) -> E2eResult<Self> {
        let port = find_free_port()?;
        let base_url = format!("http://127.0.0.1:{}", port);

        info!("Starting playground on port {}", port);

        let registry = cosmos_registry::start(config.clone()).await?;

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| E2eError::ServerStartup(format!("Failed to bind port {}: {}", port, e)))?;

        let server = SyncServer::new(&config);
        let forwarder = server.forward_registry_updates(registry.subscribe());
        let server = tokio::spawn(async move {
            if let Err(e) = server.serve_on(listener).await {
                warn!("Server exited: {}", e);
            }
        });

        let handle = ServerHandle {
            base_url: base_url.clone(),
            port,
            config,
            registry: Some(registry),
            server,
            forwarder,
        };

        handle.wait_for_healthy(Duration::from_secs(10)).await?;

        info!("Server is healthy at {}", base_url);
        Ok(handle)
    }

    /// Wait for the server to respond to health checks
    async fn wait_for_healthy(&self, timeout_duration: Duration) -> E2eResult<()> {
        let health_url = self.url(HEALTH_PATH);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            match client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Health check returned {}", resp.status());
                }
                Err(e) => {
                    // Connection refused is expected while server is starting
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(50)).await;
        }

        Err(E2eError::ServerHealthCheck(attempts))
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// WebSocket URL of the sync channel
    pub fn sync_url(&self) -> String {
        format!("ws://127.0.0.1:{}{}", self.port, SYNC_PATH)
    }

    /// Connected sync clients as reported by the health endpoint
    pub async fn connection_count(&self) -> E2eResult<u64> {
        let health: serde_json::Value = reqwest::get(self.url(HEALTH_PATH)).await?.json().await?;
        Ok(health
            .get("connections")
            .and_then(|v| v.as_u64())
            .unwrap_or_default())
    }

    /// Poll until the generated modules file satisfies `done`
    pub async fn wait_for_modules<F>(&self, what: &str, done: F) -> E2eResult<String>
    where
        F: Fn(&str) -> bool,
    {
        for _ in 0..100 {
            if let Ok(text) = fs::read_to_string(&self.config.modules_path) {
                if done(&text) {
                    return Ok(text);
                }
            }
            sleep(Duration::from_millis(50)).await;
        }
        Err(E2eError::Timeout(what.to_string()))
    }

    /// Stop the server and the registry
    pub fn stop(&mut self) {
        info!("Stopping server on port {}", self.port);
        self.server.abort();
        self.forwarder.abort();
        if let Some(registry) = self.registry.take() {
            registry.shutdown();
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Find a free port to use
pub fn find_free_port() -> E2eResult<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
