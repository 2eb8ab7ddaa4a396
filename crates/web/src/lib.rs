//! Cosmos sync server
//!
//! Serves the playground shell and relays commands between playground
//! windows over a shared WebSocket channel.

pub mod server;
pub mod static_files;
pub mod sync_hub;

pub use server::{SyncServer, HEALTH_PATH, SYNC_PATH};
pub use static_files::{Asset, StaticFiles};
pub use sync_hub::{command_type, modules_updated_message, SyncHub};
