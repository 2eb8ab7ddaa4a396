//! Cosmos E2E Test Framework
//!
//! Starts the fixture registry and sync server in-process against a
//! throwaway project, waits for the health endpoint, and exposes helpers
//! the integration tests drive over HTTP and WebSocket.

pub mod error;
pub mod server;

pub use error::{E2eError, E2eResult};
pub use server::{find_free_port, ServerHandle, TestProject};
