//! Cosmos Registry
//!
//! Discovers fixture files under a project root, statically extracts the
//! components they render, and keeps a generated manifest module in sync
//! with the file set.

pub mod manifest;
pub mod matcher;
pub mod registry;
pub mod rescan;
pub mod scanner;
pub mod watcher;

pub use manifest::{Manifest, ManifestOptions};
pub use matcher::FileMatcher;
pub use registry::{start, Registry, RegistryEvent, RegistryHandle};
pub use rescan::{Phase, RescanState};
pub use watcher::{WatchEvent, WatchEventKind};
