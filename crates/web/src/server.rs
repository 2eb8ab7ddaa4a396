//! Sync server
//!
//! Serves the playground shell and hosts the sync channel shared by every
//! open playground window.

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use cosmos_common::{CosmosConfig, PlaygroundOpts};
use cosmos_registry::RegistryEvent;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::static_files::{Asset, StaticFiles};
use crate::sync_hub::{modules_updated_message, SyncHub};

/// Path of the sync WebSocket endpoint
pub const SYNC_PATH: &str = "/_cosmos/sync";
/// Path of the liveness endpoint
pub const HEALTH_PATH: &str = "/_cosmos/health";

/// Server state shared across handlers
pub struct ServerState {
    pub hub: SyncHub,
    pub assets: StaticFiles,
    /// Serialized playground options injected into the index page
    pub playground_opts: String,
}

pub struct SyncServer {
    state: Arc<ServerState>,
}

impl SyncServer {
    pub fn new(config: &CosmosConfig) -> Self {
        let opts = PlaygroundOpts::native(config.root_path.to_string_lossy());
        // PlaygroundOpts only holds strings, serialization cannot fail
        let playground_opts = serde_json::to_string(&opts).unwrap_or_default();

        Self {
            state: Arc::new(ServerState {
                hub: SyncHub::new(),
                assets: StaticFiles::new(config.static_dir.clone()),
                playground_opts,
            }),
        }
    }

    pub fn hub(&self) -> SyncHub {
        self.state.hub.clone()
    }

    /// Create router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(index_handler))
            .route("/_playground.js", get(playground_js_handler))
            .route("/_cosmos.ico", get(favicon_handler))
            .route(SYNC_PATH, get(sync_handler))
            .route(HEALTH_PATH, get(health_handler))
            .fallback(not_found_handler)
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind `host:port` and serve until the listener fails
    pub async fn serve(self, host: &str, port: u16) -> anyhow::Result<()> {
        let listener = TcpListener::bind((host, port)).await?;
        self.serve_on(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve_on(self, listener: TcpListener) -> anyhow::Result<()> {
        let addr: SocketAddr = listener.local_addr()?;
        info!("Playground listening on http://{}", addr);

        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    /// Tell every connected client to reload after each manifest write
    pub fn forward_registry_updates(
        &self,
        mut updates: broadcast::Receiver<RegistryEvent>,
    ) -> JoinHandle<()> {
        let hub = self.hub();
        tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(RegistryEvent::ManifestUpdated { fixture_files }) => {
                        let sent = hub.broadcast(&modules_updated_message(fixture_files)).await;
                        debug!("Sent reload to {} clients", sent);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // The newest update is still queued and triggers the reload
                        warn!("Skipped {} registry updates", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn index_handler(State(state): State<Arc<ServerState>>) -> Response {
    state.assets.serve_index(&state.playground_opts).await
}

async fn playground_js_handler(State(state): State<Arc<ServerState>>) -> Response {
    state.assets.serve(Asset::PlaygroundJs).await
}

async fn favicon_handler(State(state): State<Arc<ServerState>>) -> Response {
    state.assets.serve(Asset::Favicon).await
}

async fn sync_handler(State(state): State<Arc<ServerState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        state.hub.handle_socket(socket).await;
    })
}

async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "connections": state.hub.connection_count().await,
    }))
}

async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}
