//! Playground sync channel
//!
//! Relays command messages between connected playground clients. Each
//! connection gets an outbound queue drained by its own writer task, so one
//! sender's messages reach every recipient in the order they were sent and a
//! closed connection only drops its own queue.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, trace, warn};
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// Command type sent to every client after the manifest is regenerated
pub const MODULES_UPDATED: &str = "modulesUpdated";

/// The `type` tag of a command frame, if it is one
pub fn command_type(text: &str) -> Option<String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map.get("type").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Reload signal for connected clients
pub fn modules_updated_message(fixture_file_count: usize) -> String {
    serde_json::json!({
        "type": MODULES_UPDATED,
        "fixtureFileCount": fixture_file_count,
    })
    .to_string()
}

/// Active connections and their outbound queues
#[derive(Clone, Default)]
pub struct SyncHub {
    connections: Arc<RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>>,
}

impl SyncHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection; the receiver yields everything addressed to it
    pub async fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.write().await.insert(id, tx);
        debug!("Sync connection {} registered", id);
        (id, rx)
    }

    pub async fn unregister(&self, id: ConnectionId) {
        if self.connections.write().await.remove(&id).is_some() {
            debug!("Sync connection {} removed", id);
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Forward `text` verbatim to every connection except `from`.
    /// Returns the number of connections it was queued for.
    pub async fn relay(&self, from: ConnectionId, text: &str) -> usize {
        let connections = self.connections.read().await;
        let mut delivered = 0;
        for (id, tx) in connections.iter() {
            if *id == from {
                continue;
            }
            if tx.send(text.to_string()).is_ok() {
                delivered += 1;
            }
        }
        trace!("Relayed frame from {} to {} connections", from, delivered);
        delivered
    }

    /// Send `text` to every connection
    pub async fn broadcast(&self, text: &str) -> usize {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|tx| tx.send(text.to_string()).is_ok())
            .count()
    }

    /// Drive one WebSocket connection until either side closes it
    pub async fn handle_socket(&self, socket: WebSocket) {
        let (id, outbound) = self.register().await;
        let (ws_write, ws_read) = socket.split();

        let writer = Self::forward_outbound(outbound, ws_write);
        let reader = self.forward_inbound(id, ws_read);

        tokio::select! {
            _ = writer => {}
            _ = reader => {}
        }

        self.unregister(id).await;
        debug!("Sync session {} ended", id);
    }

    /// Relay command frames from one client
    async fn forward_inbound(&self, id: ConnectionId, mut ws_read: futures::stream::SplitStream<WebSocket>) {
        while let Some(msg) = ws_read.next().await {
            match msg {
                Ok(Message::Text(text)) => match command_type(&text) {
                    Some(command) => {
                        trace!("{} sent {}", id, command);
                        self.relay(id, &text).await;
                    }
                    None => warn!("Dropping untagged frame from {}", id),
                },
                Ok(Message::Close(_)) => {
                    debug!("Sync connection {} closed by client", id);
                    break;
                }
                Ok(Message::Binary(_)) => {
                    trace!("Ignoring binary frame from {}", id);
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Err(e) => {
                    // Abrupt disconnects land here; not an error for the hub
                    debug!("Sync connection {} dropped: {}", id, e);
                    break;
                }
            }
        }
    }

    /// Write queued frames to one client
    async fn forward_outbound(
        mut outbound: mpsc::UnboundedReceiver<String>,
        mut ws_write: futures::stream::SplitSink<WebSocket, Message>,
    ) {
        while let Some(text) = outbound.recv().await {
            if let Err(e) = ws_write.send(Message::Text(text)).await {
                debug!("Sync client went away: {}", e);
                break;
            }
        }

        let _ = ws_write.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_type() {
        assert_eq!(command_type(r#"{"type":"MY_CMD"}"#), Some("MY_CMD".to_string()));
        assert_eq!(command_type(r#"{"type":7}"#), None);
        assert_eq!(command_type(r#"["type"]"#), None);
        assert_eq!(command_type("not json"), None);
    }

    #[test]
    fn test_modules_updated_message() {
        let msg: Value = serde_json::from_str(&modules_updated_message(3)).unwrap();
        assert_eq!(msg["type"], MODULES_UPDATED);
        assert_eq!(msg["fixtureFileCount"], 3);
    }

    #[tokio::test]
    async fn test_relay_skips_sender() {
        let hub = SyncHub::new();
        let (a, mut a_rx) = hub.register().await;
        let (_b, mut b_rx) = hub.register().await;
        let (_c, mut c_rx) = hub.register().await;

        let delivered = hub.relay(a, r#"{"type":"MY_CMD"}"#).await;

        assert_eq!(delivered, 2);
        assert_eq!(b_rx.try_recv().unwrap(), r#"{"type":"MY_CMD"}"#);
        assert_eq!(c_rx.try_recv().unwrap(), r#"{"type":"MY_CMD"}"#);
        assert!(a_rx.try_recv().is_err());
        assert!(b_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_per_sender_order() {
        let hub = SyncHub::new();
        let (a, _a_rx) = hub.register().await;
        let (_b, mut b_rx) = hub.register().await;

        for i in 0..5 {
            hub.relay(a, &format!(r#"{{"type":"STEP","n":{}}}"#, i)).await;
        }

        for i in 0..5 {
            let msg: Value = serde_json::from_str(&b_rx.try_recv().unwrap()).unwrap();
            assert_eq!(msg["n"], i);
        }
    }

    #[tokio::test]
    async fn test_unregistered_connection_gets_nothing() {
        let hub = SyncHub::new();
        let (a, _a_rx) = hub.register().await;
        let (b, mut b_rx) = hub.register().await;
        let (_c, mut c_rx) = hub.register().await;

        hub.unregister(b).await;
        assert_eq!(hub.connection_count().await, 2);

        assert_eq!(hub.relay(a, r#"{"type":"X"}"#).await, 1);
        assert!(c_rx.try_recv().is_ok());
        // Queue closed once the hub dropped its sender
        assert!(matches!(
            b_rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_dropped_queue_does_not_affect_others() {
        let hub = SyncHub::new();
        let (a, _a_rx) = hub.register().await;
        let (_b, b_rx) = hub.register().await;
        let (_c, mut c_rx) = hub.register().await;

        // Writer gone before the hub noticed the disconnect
        drop(b_rx);

        assert_eq!(hub.relay(a, r#"{"type":"X"}"#).await, 1);
        assert_eq!(hub.broadcast(&modules_updated_message(0)).await, 2);
        assert_eq!(c_rx.try_recv().unwrap(), r#"{"type":"X"}"#);
        assert!(c_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone() {
        let hub = SyncHub::new();
        let (_a, mut a_rx) = hub.register().await;
        let (_b, mut b_rx) = hub.register().await;

        assert_eq!(hub.broadcast(&modules_updated_message(1)).await, 2);
        assert!(a_rx.try_recv().is_ok());
        assert!(b_rx.try_recv().is_ok());
    }
}
