//! Fixture file matching
//!
//! Patterns are matched against paths relative to the project root, with
//! `*` confined to one path segment and `**` spanning any number.

use cosmos_common::{CosmosConfig, Error, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Extensions tried when resolving extensionless module paths
pub const MODULE_EXTENSIONS: [&str; 4] = ["js", "jsx", "ts", "tsx"];

#[derive(Debug, Clone)]
pub struct FileMatcher {
    root: PathBuf,
    include: GlobSet,
    ignore: GlobSet,
    exclude_dirs: GlobSet,
}

impl FileMatcher {
    pub fn new(config: &CosmosConfig) -> Result<Self> {
        Ok(Self {
            root: config.root_path.clone(),
            include: build_set(&config.file_match)?,
            ignore: build_set(&config.file_match_ignore)?,
            exclude_dirs: build_set(&config.exclude)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` qualifies as a fixture file
    pub fn is_fixture_file(&self, path: &Path) -> bool {
        let Some(rel) = self.relative(path) else {
            return false;
        };
        self.include.is_match(rel) && !self.ignore.is_match(rel) && !self.in_excluded_dir(rel)
    }

    /// Whether `path` is, or lives under, a pruned directory
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.relative(path)
            .map(|rel| self.in_excluded_dir(rel))
            .unwrap_or(true)
    }

    /// All qualifying files under the root, sorted by path
    pub fn find_fixture_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir() && self.is_pruned_dir(entry.path()))
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && self.is_fixture_file(entry.path()))
            .map(|entry| entry.into_path())
            .collect();

        files.sort();
        files
    }

    /// `dir` and every directory below it that traversal does not prune
    pub fn walk_dirs(&self, dir: &Path) -> Vec<PathBuf> {
        WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| entry.file_type().is_dir() && !self.is_pruned_dir(entry.path()))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.into_path()),
                Err(e) => {
                    debug!("Skipping unreadable directory: {}", e);
                    None
                }
            })
            .collect()
    }

    fn is_pruned_dir(&self, path: &Path) -> bool {
        self.relative(path)
            .map(|rel| !rel.as_os_str().is_empty() && self.exclude_dirs.is_match(rel))
            .unwrap_or(false)
    }

    fn in_excluded_dir(&self, rel: &Path) -> bool {
        rel.ancestors()
            .filter(|a| !a.as_os_str().is_empty())
            .any(|a| self.exclude_dirs.is_match(a))
    }

    fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.root).ok()
    }
}

fn build_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| Error::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| Error::InvalidPattern {
        pattern: patterns.join(", "),
        reason: e.to_string(),
    })
}
