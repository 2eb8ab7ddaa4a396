//! Cosmos Common Library
//!
//! Shared types, configuration and the playground query codec.

pub mod config;
pub mod error;
pub mod query;
pub mod types;

// Re-export commonly used types
pub use config::CosmosConfig;
pub use error::{Error, Result};
pub use query::QueryParams;
pub use types::*;

/// Cosmos version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Forward-slash form of a path, as written into generated modules and URLs
pub fn slash(path: &std::path::Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
