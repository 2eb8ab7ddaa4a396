//! Module manifest
//!
//! [`Manifest`] is the typed source of truth; [`Manifest::render`] produces
//! the exact text external loaders parse. The text is never read back.

use cosmos_common::{slash, CosmosConfig, Error, FixtureFile, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

const HEADER: &str = "// This file is automatically generated by Cosmos. Best ignore it.";

/// Static configuration written into the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestOptions {
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub options: ManifestOptions,
    /// Sorted by file path
    pub fixture_files: Vec<FixtureFile>,
    /// Proxies module to require, if the project has one
    pub proxies_path: Option<String>,
}

impl Manifest {
    /// Build from scanned files; `fixture_files` is re-sorted so the result
    /// only depends on the set of files
    pub fn new(config: &CosmosConfig, mut fixture_files: Vec<FixtureFile>, proxies_exist: bool) -> Self {
        fixture_files.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        Self {
            options: ManifestOptions { port: config.port },
            fixture_files,
            proxies_path: proxies_exist.then(|| slash(&config.proxies_path)),
        }
    }

    /// Fixture module paths, in manifest order
    pub fn fixture_modules(&self) -> impl Iterator<Item = &str> {
        self.fixture_files.iter().map(|f| f.file_path.as_str())
    }

    /// Render the manifest module text
    pub fn render(&self) -> Result<String> {
        let fixture_modules: Vec<String> = self
            .fixture_modules()
            .map(|path| {
                let quoted = quote(path);
                format!("{quoted}:require({quoted})")
            })
            .collect();

        let fixture_files = serde_json::to_string(&self.fixture_files)
            .map_err(|e| Error::Generation(format!("fixture files: {}", e)))?;

        let proxies = match &self.proxies_path {
            Some(path) => format!("require({})", quote(path)),
            None => "[]".to_string(),
        };

        Ok(format!(
            "{HEADER}
export const options = {{
  port: {port}
}};

export function getUserModules() {{
  return {{
    fixtureModules: {{{modules}}},
    fixtureFiles: {fixture_files},
    proxies: {proxies}
  }}
}};
",
            port = self.options.port,
            modules = fixture_modules.join(","),
        ))
    }
}

/// Single-quoted JS string literal
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Temp file used while replacing `path`
pub fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cosmos.modules.js".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

/// Replace `path` with `contents` so readers see either the old or the new
/// file, never a partial one
pub async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let tmp_path = temp_path(path);
    fs::write(&tmp_path, contents).await?;
    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }

    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

/// Render and write `manifest` to the configured modules path
pub async fn write_manifest(config: &CosmosConfig, manifest: &Manifest) -> Result<()> {
    let contents = manifest.render()?;
    write_atomic(&config.modules_path, &contents).await?;
    info!(
        "Generated {} with {} fixture files",
        config.modules_path.display(),
        manifest.fixture_files.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmos_common::ComponentRef;
    use tempfile::TempDir;

    fn config() -> CosmosConfig {
        CosmosConfig {
            port: 10001,
            ..CosmosConfig::for_root("/mock").unwrap()
        }
    }

    fn my_component() -> FixtureFile {
        FixtureFile {
            file_path: "/mock/MyComponent.fixture.js".to_string(),
            components: vec![ComponentRef::new("MyComponent", "/mock/MyComponent.js")],
        }
    }

    #[test]
    fn test_render_exact_text() {
        let manifest = Manifest::new(&config(), vec![my_component()], true);

        let expected = r#"// This file is automatically generated by Cosmos. Best ignore it.
export const options = {
  port: 10001
};

export function getUserModules() {
  return {
    fixtureModules: {'/mock/MyComponent.fixture.js':require('/mock/MyComponent.fixture.js')},
    fixtureFiles: [{"filePath":"/mock/MyComponent.fixture.js","components":[{"name":"MyComponent","filePath":"/mock/MyComponent.js"}]}],
    proxies: require('/mock/cosmos.proxies')
  }
};
"#;
        assert_eq!(manifest.render().unwrap(), expected);
    }

    #[test]
    fn test_render_without_fixtures_or_proxies() {
        let text = Manifest::new(&config(), Vec::new(), false).render().unwrap();
        assert!(text.contains("    fixtureModules: {},\n"));
        assert!(text.contains("    fixtureFiles: [],\n"));
        assert!(text.contains("    proxies: []\n"));
    }

    #[test]
    fn test_order_independent_of_input() {
        let other = FixtureFile {
            file_path: "/mock/A.fixture.js".to_string(),
            components: Vec::new(),
        };
        let a = Manifest::new(&config(), vec![my_component(), other.clone()], false);
        let b = Manifest::new(&config(), vec![other, my_component()], false);

        assert_eq!(a.render().unwrap(), b.render().unwrap());
        assert_eq!(
            a.fixture_modules().collect::<Vec<_>>(),
            vec!["/mock/A.fixture.js", "/mock/MyComponent.fixture.js"]
        );
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(r"/it's/a\path"), r"'/it\'s/a\\path'");
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gen/cosmos.modules.js");

        write_atomic(&path, "first").await.unwrap();
        write_atomic(&path, "second").await.unwrap();

        assert_eq!(fs::read_to_string(&path).await.unwrap(), "second");
        assert!(!temp_path(&path).exists());
    }
}
