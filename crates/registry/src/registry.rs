//! Fixture registry
//!
//! Owns the manifest file. Every qualifying filesystem event triggers a full
//! rescan and regeneration; events that land mid-cycle coalesce into a single
//! follow-up cycle. Manifest writes happen one at a time on the registry task.

use crate::manifest::{self, Manifest};
use crate::matcher::{FileMatcher, MODULE_EXTENSIONS};
use crate::rescan::{Phase, RescanState};
use crate::scanner::{self, find_module_file};
use crate::watcher::{ProjectWatcher, WatchEvent, WatchEventKind};
use cosmos_common::{CosmosConfig, Error, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Published after each manifest write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    ManifestUpdated { fixture_files: usize },
}

pub struct Registry {
    config: Arc<CosmosConfig>,
    matcher: Arc<FileMatcher>,
    state: RescanState,
    updates: broadcast::Sender<RegistryEvent>,
    watcher: Option<ProjectWatcher>,
}

impl Registry {
    pub fn new(config: CosmosConfig) -> Result<Self> {
        let matcher = FileMatcher::new(&config)?;
        let (updates, _) = broadcast::channel(16);
        Ok(Self {
            config: Arc::new(config),
            matcher: Arc::new(matcher),
            state: RescanState::new(),
            updates,
            watcher: None,
        })
    }

    /// Start watching the project root. Events arrive on the returned
    /// channel; pass it to [`Registry::run`].
    pub fn watch(&mut self) -> Result<mpsc::UnboundedReceiver<WatchEvent>> {
        let (watcher, events) = ProjectWatcher::start(self.matcher.clone())?;
        self.watcher = Some(watcher);
        Ok(events)
    }

    pub fn config(&self) -> &CosmosConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.updates.subscribe()
    }

    /// Run one full cycle now, plus any follow-up requested meanwhile
    pub async fn regenerate(&mut self) -> Result<Manifest> {
        if !self.state.request() {
            return Err(Error::Internal("regeneration already in flight".to_string()));
        }
        loop {
            let result = self.cycle().await;
            if !self.state.finish() {
                return result;
            }
        }
    }

    /// Process watch events until the source closes
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<WatchEvent>) {
        info!("Registry started for {}", self.config.root_path.display());

        while let Some(event) = events.recv().await {
            if !self.observe(&event) || !self.state.request() {
                continue;
            }

            loop {
                if let Err(e) = self.cycle().await {
                    debug!("Regeneration cycle failed: {}", e);
                }
                // Anything that arrived while we were busy
                while let Ok(event) = events.try_recv() {
                    if self.observe(&event) {
                        self.state.request();
                    }
                }
                if !self.state.finish() {
                    break;
                }
                debug!("Running coalesced rescan");
            }
        }

        info!("Registry stopped");
    }

    /// Scan, then generate and write. The previous manifest stays in place
    /// when generation fails.
    async fn cycle(&mut self) -> Result<Manifest> {
        let matcher = self.matcher.clone();
        let proxies_path = self.config.proxies_path.clone();
        let (outcome, proxies_exist) = tokio::task::spawn_blocking(move || {
            let outcome = scanner::scan_project(&matcher);
            let proxies_exist = find_module_file(&proxies_path).is_some();
            (outcome, proxies_exist)
        })
        .await
        .map_err(|e| Error::Internal(format!("scan task failed: {}", e)))?;

        self.state.begin_generate();

        let manifest = Manifest::new(&self.config, outcome.files, proxies_exist);
        if let Err(e) = manifest::write_manifest(&self.config, &manifest).await {
            error!("Manifest generation failed, keeping previous manifest: {}", e);
            return Err(e);
        }

        let _ = self.updates.send(RegistryEvent::ManifestUpdated {
            fixture_files: manifest.fixture_files.len(),
        });
        Ok(manifest)
    }

    /// Keep directory watches in step with the tree, then report whether
    /// the event can change the manifest
    fn observe(&mut self, event: &WatchEvent) -> bool {
        if let Some(watcher) = self.watcher.as_mut() {
            match event.kind {
                WatchEventKind::Created if event.path.is_dir() => {
                    if let Err(e) = watcher.watch_tree(&event.path) {
                        warn!("Not watching new directory: {}", e);
                    }
                }
                WatchEventKind::Removed => watcher.forget(&event.path),
                _ => {}
            }
        }
        self.qualifies(event)
    }

    /// Whether an event can change the manifest
    fn qualifies(&self, event: &WatchEvent) -> bool {
        let path = event.path.as_path();

        if path == self.config.modules_path || path == manifest::temp_path(&self.config.modules_path) {
            return false;
        }
        if self.matcher.is_excluded(path) {
            return false;
        }
        if self.matcher.is_fixture_file(path) || self.is_proxies_module(path) {
            return true;
        }
        if event.kind == WatchEventKind::Modified {
            return false;
        }

        // Component references resolve against the files present, and a
        // created or removed directory may hold fixture files
        match path.extension() {
            Some(ext) => MODULE_EXTENSIONS.iter().any(|m| ext == *m),
            None => true,
        }
    }

    fn is_proxies_module(&self, path: &Path) -> bool {
        let proxies = &self.config.proxies_path;
        path == proxies || (path.file_stem() == proxies.file_name() && path.parent() == proxies.parent())
    }
}

/// A started registry
pub struct RegistryHandle {
    updates: broadcast::Sender<RegistryEvent>,
    manifest: Manifest,
    task: JoinHandle<()>,
}

impl RegistryHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.updates.subscribe()
    }

    /// Manifest produced at startup
    pub fn initial_manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

/// Watch the project root, generate the manifest once, then keep it current
/// on a background task.
///
/// Fails if the watcher cannot start or the initial manifest cannot be
/// written.
pub async fn start(config: CosmosConfig) -> Result<RegistryHandle> {
    let mut registry = Registry::new(config)?;
    let events = registry.watch()?;

    let manifest = registry.regenerate().await?;
    let updates = registry.updates.clone();

    let task = tokio::spawn(async move {
        registry.run(events).await;
        warn!("Filesystem watch closed");
    });

    Ok(RegistryHandle {
        updates,
        manifest,
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmos_common::slash;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    const FIXTURE: &str = "import MyComponent from './MyComponent';\nexport default { component: MyComponent };\n";

    fn project() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("MyComponent.js"), "export default () => null;\n").unwrap();
        fs::write(tmp.path().join("MyComponent.fixture.js"), FIXTURE).unwrap();
        tmp
    }

    fn fixture_count(config: &CosmosConfig) -> Option<usize> {
        let text = fs::read_to_string(&config.modules_path).ok()?;
        let line = text.lines().find(|l| l.trim_start().starts_with("fixtureFiles: "))?;
        let json = line.trim().trim_start_matches("fixtureFiles: ").trim_end_matches(',');
        let files: Vec<serde_json::Value> = serde_json::from_str(json).ok()?;
        Some(files.len())
    }

    async fn until_count(config: &CosmosConfig, expected: usize) {
        for _ in 0..50 {
            if fixture_count(config) == Some(expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("manifest never reached {} fixture files", expected);
    }

    #[tokio::test]
    async fn test_regenerate_is_deterministic() {
        let tmp = project();
        fs::write(tmp.path().join("cosmos.proxies.js"), "export default [];\n").unwrap();
        let config = CosmosConfig::for_root(tmp.path()).unwrap();
        let mut registry = Registry::new(config.clone()).unwrap();

        let manifest = registry.regenerate().await.unwrap();
        let first = fs::read_to_string(&config.modules_path).unwrap();
        registry.regenerate().await.unwrap();
        let second = fs::read_to_string(&config.modules_path).unwrap();

        assert_eq!(first, second);
        assert_eq!(manifest.fixture_files.len(), 1);
        assert_eq!(manifest.fixture_files[0].components[0].name, "MyComponent");
        assert!(first.contains("proxies: require("));
        assert_eq!(registry.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_qualifying_events() {
        let tmp = project();
        let config = CosmosConfig::for_root(tmp.path()).unwrap();
        let registry = Registry::new(config.clone()).unwrap();
        let root = tmp.path();

        let yes = [
            WatchEvent::new(root.join("New.fixture.js"), WatchEventKind::Created),
            WatchEvent::new(root.join("MyComponent.fixture.js"), WatchEventKind::Modified),
            WatchEvent::new(root.join("cosmos.proxies.js"), WatchEventKind::Modified),
            WatchEvent::new(root.join("components"), WatchEventKind::Removed),
            WatchEvent::new(root.join("Button.tsx"), WatchEventKind::Created),
            WatchEvent::new(root.join("MyComponent.js"), WatchEventKind::Removed),
        ];
        for event in yes {
            assert!(registry.qualifies(&event), "{:?} should qualify", event);
        }

        let no = [
            WatchEvent::new(config.modules_path.clone(), WatchEventKind::Modified),
            WatchEvent::new(manifest::temp_path(&config.modules_path), WatchEventKind::Created),
            WatchEvent::new(root.join("MyComponent.js"), WatchEventKind::Modified),
            WatchEvent::new(root.join("node_modules/x/y.fixture.js"), WatchEventKind::Created),
            WatchEvent::new(root.join("src"), WatchEventKind::Modified),
            WatchEvent::new(root.join("styles.css"), WatchEventKind::Created),
            WatchEvent::new(root.join("node_modules/x/index.js"), WatchEventKind::Created),
        ];
        for event in no {
            assert!(!registry.qualifies(&event), "{:?} should not qualify", event);
        }
    }

    #[tokio::test]
    async fn test_event_burst_coalesces() {
        let tmp = project();
        let config = CosmosConfig::for_root(tmp.path()).unwrap();
        let registry = Registry::new(config.clone()).unwrap();
        let mut updates = registry.subscribe();

        let (tx, rx) = mpsc::unbounded_channel();
        for i in 0..20 {
            let path = tmp.path().join(format!("Burst{}.fixture.js", i));
            fs::write(&path, FIXTURE).unwrap();
            tx.send(WatchEvent::new(path, WatchEventKind::Created)).unwrap();
        }
        drop(tx);

        registry.run(rx).await;

        // First event starts a cycle, the other 19 collapse into one more
        let mut writes = 0;
        while let Ok(RegistryEvent::ManifestUpdated { fixture_files }) = updates.try_recv() {
            assert_eq!(fixture_files, 21);
            writes += 1;
        }
        assert!((1..=2).contains(&writes), "expected at most two writes, got {}", writes);
        assert_eq!(fixture_count(&config), Some(21));
    }

    #[tokio::test]
    async fn test_new_fixture_file_is_picked_up() {
        let tmp = project();
        let config = CosmosConfig::for_root(tmp.path()).unwrap();

        let handle = start(config.clone()).await.unwrap();
        assert_eq!(handle.initial_manifest().fixture_files.len(), 1);
        assert_eq!(fixture_count(&config), Some(1));

        fs::write(tmp.path().join("Another.fixture.js"), FIXTURE).unwrap();
        until_count(&config, 2).await;

        let text = fs::read_to_string(&config.modules_path).unwrap();
        assert_eq!(text.matches("MyComponent.fixture.js':require(").count(), 1);
        assert_eq!(text.matches("Another.fixture.js':require(").count(), 1);

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_manifest() {
        let tmp = project();
        let config = CosmosConfig::for_root(tmp.path()).unwrap();
        let mut registry = Registry::new(config.clone()).unwrap();

        registry.regenerate().await.unwrap();
        let before = fs::read_to_string(&config.modules_path).unwrap();
        let mut updates = registry.subscribe();

        // A directory squatting on the temp path makes the write fail
        let blocker = manifest::temp_path(&config.modules_path);
        fs::create_dir(&blocker).unwrap();
        fs::write(tmp.path().join("Another.fixture.js"), FIXTURE).unwrap();

        assert!(registry.regenerate().await.is_err());
        assert_eq!(fs::read_to_string(&config.modules_path).unwrap(), before);
        assert!(updates.try_recv().is_err());
        assert_eq!(registry.phase(), Phase::Idle);

        // The next cycle recovers
        fs::remove_dir(&blocker).unwrap();
        let manifest = registry.regenerate().await.unwrap();
        assert_eq!(manifest.fixture_files.len(), 2);
        assert_eq!(fixture_count(&config), Some(2));
        assert_eq!(
            updates.try_recv().unwrap(),
            RegistryEvent::ManifestUpdated { fixture_files: 2 }
        );
    }

    #[tokio::test]
    async fn test_component_created_after_fixture_resolves() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("Late.fixture.js"),
            "import Late from './Late';\nexport default { component: Late };\n",
        )
        .unwrap();
        let config = CosmosConfig::for_root(tmp.path()).unwrap();
        let mut registry = Registry::new(config.clone()).unwrap();

        let manifest = registry.regenerate().await.unwrap();
        let late = tmp.path().join("Late");
        assert_eq!(manifest.fixture_files[0].components[0].file_path, slash(&late));

        let component = tmp.path().join("Late.js");
        fs::write(&component, "export default () => null;\n").unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(WatchEvent::new(component.clone(), WatchEventKind::Created)).unwrap();
        drop(tx);
        registry.run(rx).await;

        let text = fs::read_to_string(&config.modules_path).unwrap();
        assert!(text.contains(&format!("\"filePath\":\"{}\"", slash(&component))));
    }

    #[tokio::test]
    async fn test_start_fails_for_missing_root() {
        let tmp = TempDir::new().unwrap();
        let config = CosmosConfig::for_root(tmp.path().join("missing")).unwrap();
        let err = start(config).await.err().unwrap();
        assert!(matches!(err, Error::Watch { .. }));
    }
}
