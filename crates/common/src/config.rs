//! Cosmos configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default config file name, looked up in the project root
pub const CONFIG_FILE_NAME: &str = "cosmos.toml";

/// Project configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CosmosConfig {
    /// Project root, watched recursively
    pub root_path: PathBuf,

    /// Sync server port
    pub port: u16,

    /// Sync server hostname (binds 127.0.0.1 when unset)
    pub hostname: Option<String>,

    /// Globs a file must match to count as a fixture file
    pub file_match: Vec<String>,

    /// Globs that disqualify an otherwise matching file
    pub file_match_ignore: Vec<String>,

    /// Globs for directories pruned from traversal
    pub exclude: Vec<String>,

    /// Module exporting the user's proxies
    pub proxies_path: PathBuf,

    /// Where the generated manifest module is written
    pub modules_path: PathBuf,

    /// Optional directory overriding the built-in template, bundle and icon
    pub static_dir: Option<PathBuf>,
}

const SCRIPT_EXTS: &str = "{js,jsx,ts,tsx}";

impl Default for CosmosConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("."),
            port: 8989,
            hostname: None,
            file_match: default_file_match(),
            file_match_ignore: default_file_match_ignore(),
            exclude: default_exclude(),
            proxies_path: PathBuf::from("cosmos.proxies"),
            modules_path: PathBuf::from("cosmos.modules.js"),
            static_dir: None,
        }
    }
}

pub fn default_file_match() -> Vec<String> {
    vec![
        format!("**/__fixture__/**/*.{SCRIPT_EXTS}"),
        format!("**/__fixtures__/**/*.{SCRIPT_EXTS}"),
        format!("**/*.fixture.{SCRIPT_EXTS}"),
        format!("**/*.fixtures.{SCRIPT_EXTS}"),
        format!("**/fixture.{SCRIPT_EXTS}"),
        format!("**/fixtures.{SCRIPT_EXTS}"),
    ]
}

pub fn default_file_match_ignore() -> Vec<String> {
    vec!["**/node_modules/**".to_string()]
}

pub fn default_exclude() -> Vec<String> {
    vec!["**/node_modules".to_string(), "**/.git".to_string()]
}

impl CosmosConfig {
    /// Load configuration from file, falling back to defaults when absent.
    ///
    /// Relative paths in the result are resolved against `root_path`.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let mut config: Self = toml::from_str(&content)?;
            // A relative root in the file is relative to the file itself
            if config.root_path.is_relative() {
                if let Some(parent) = path.parent() {
                    config.root_path = parent.join(&config.root_path);
                }
            }
            debug!("Loaded config from {}", path.display());
            config
        } else {
            Self::default()
        };
        config.resolved()
    }

    /// Configuration for a project root with every other value defaulted
    pub fn for_root(root: impl Into<PathBuf>) -> Result<Self> {
        Self {
            root_path: root.into(),
            ..Default::default()
        }
        .resolved()
    }

    /// Make every path absolute and validate the result
    pub fn resolved(mut self) -> Result<Self> {
        if self.root_path.is_relative() {
            self.root_path = std::env::current_dir()?.join(&self.root_path);
        }
        self.root_path = normalize(&self.root_path);
        self.proxies_path = normalize(&self.root_path.join(&self.proxies_path));
        self.modules_path = normalize(&self.root_path.join(&self.modules_path));
        self.static_dir = self
            .static_dir
            .map(|dir| normalize(&self.root_path.join(dir)));

        if self.file_match.is_empty() {
            return Err(Error::InvalidConfig(
                "file_match must contain at least one pattern".to_string(),
            ));
        }
        Ok(self)
    }

    /// Address the sync server binds to
    pub fn bind_host(&self) -> &str {
        self.hostname.as_deref().unwrap_or("127.0.0.1")
    }
}

/// Lexically remove `.` and `..` components without touching the filesystem
pub fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
