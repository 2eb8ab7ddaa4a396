//! Filesystem watch source
//!
//! Adapts `notify` events into plain `(path, kind)` pairs delivered over a
//! channel, in the order the platform watcher reports them. Only directories
//! the matcher does not prune are watched.

use crate::matcher::FileMatcher;
use cosmos_common::{Error, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: WatchEventKind,
}

impl WatchEvent {
    pub fn new(path: impl Into<PathBuf>, kind: WatchEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Filesystem watch over the unpruned directories of a project.
///
/// Each directory gets its own non-recursive watch, so excluded trees such as
/// `node_modules` cost nothing. Directories created later are added through
/// [`ProjectWatcher::watch_tree`]. The watch stops when this is dropped.
pub struct ProjectWatcher {
    watcher: RecommendedWatcher,
    matcher: Arc<FileMatcher>,
    watched: HashSet<PathBuf>,
}

impl ProjectWatcher {
    /// Watch every directory under the matcher's root. Failing to start is
    /// fatal to the caller.
    pub fn start(matcher: Arc<FileMatcher>) -> Result<(Self, mpsc::UnboundedReceiver<WatchEvent>)> {
        let root = matcher.root().to_path_buf();
        if !root.is_dir() {
            return Err(Error::Watch {
                path: root,
                reason: "not a directory".to_string(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    for watch_event in convert(event) {
                        trace!("fs event {:?}", watch_event);
                        if tx.send(watch_event).is_err() {
                            // Receiver gone; the registry has shut down
                            return;
                        }
                    }
                }
                Err(e) => warn!("Filesystem watch error: {}", e),
            }
        })
        .map_err(|e| watch_error(&root, e))?;

        let mut project = Self {
            watcher,
            matcher,
            watched: HashSet::new(),
        };
        let count = project.watch_tree(&root)?;

        info!("Watching {} ({} directories)", root.display(), count);
        Ok((project, rx))
    }

    /// Add watches for `dir` and its unpruned subdirectories not yet
    /// watched. Returns how many were added.
    pub fn watch_tree(&mut self, dir: &Path) -> Result<usize> {
        if self.matcher.is_excluded(dir) {
            return Ok(0);
        }

        let mut added = 0;
        for path in self.matcher.walk_dirs(dir) {
            if self.watched.contains(&path) {
                continue;
            }
            self.watcher
                .watch(&path, RecursiveMode::NonRecursive)
                .map_err(|e| watch_error(&path, e))?;
            self.watched.insert(path);
            added += 1;
        }
        if added > 0 {
            debug!("Watching {} new directories under {}", added, dir.display());
        }
        Ok(added)
    }

    /// Drop bookkeeping for a removed path and everything below it. The
    /// platform releases the watches of deleted directories itself.
    pub fn forget(&mut self, path: &Path) {
        self.watched.retain(|p| !p.starts_with(path));
    }

    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }

    pub fn is_watched(&self, dir: &Path) -> bool {
        self.watched.contains(dir)
    }
}

fn watch_error(path: &Path, e: notify::Error) -> Error {
    Error::Watch {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

fn convert(event: notify::Event) -> Vec<WatchEvent> {
    let kinds: Vec<WatchEventKind> = match event.kind {
        EventKind::Create(_) => vec![WatchEventKind::Created],
        EventKind::Remove(_) => vec![WatchEventKind::Removed],
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => vec![WatchEventKind::Removed],
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => vec![WatchEventKind::Created],
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            vec![WatchEventKind::Removed, WatchEventKind::Created]
        }
        EventKind::Modify(_) => vec![WatchEventKind::Modified],
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };

    if kinds.len() == event.paths.len() {
        // Rename with both ends: old path removed, new path created
        return event
            .paths
            .into_iter()
            .zip(kinds)
            .map(|(path, kind)| WatchEvent { path, kind })
            .collect();
    }

    event
        .paths
        .into_iter()
        .map(|path| WatchEvent { path, kind: kinds[0] })
        .collect()
}
