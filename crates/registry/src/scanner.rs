//! Static component discovery
//!
//! Reads fixture sources without executing them: module bindings come from
//! `import` declarations and `require` calls, and a binding becomes a
//! component reference when the fixture uses it as `component: Name`.

use crate::matcher::{FileMatcher, MODULE_EXTENSIONS};
use cosmos_common::config::normalize;
use cosmos_common::{slash, ComponentRef, Error, FixtureFile, Result};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

static DEFAULT_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s+([A-Za-z_$][\w$]*)\s*(?:,\s*\{([^}]*)\}\s*)?from\s*['"]([^'"]+)['"]"#)
        .expect("default import pattern")
});

static NAMED_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s*\{([^}]*)\}\s*from\s*['"]([^'"]+)['"]"#).expect("named import pattern")
});

static REQUIRE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*require\(\s*['"]([^'"]+)['"]\s*\)"#)
        .expect("require pattern")
});

static COMPONENT_USAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bcomponent\s*:\s*([A-Za-z_$][\w$]*)"#).expect("component usage pattern")
});

/// A module binding visible in a fixture file
#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    /// Name the exporting module gives the value
    display_name: String,
    specifier: String,
}

/// Result of scanning a whole project
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Successfully scanned files, sorted by path
    pub files: Vec<FixtureFile>,
    /// Files that could not be scanned; excluded from `files`
    pub errors: Vec<Error>,
}

/// Scan every qualifying file under the matcher's root
pub fn scan_project(matcher: &FileMatcher) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();

    for path in matcher.find_fixture_files() {
        match scan_file(&path) {
            Ok(file) => outcome.files.push(file),
            Err(e) => {
                warn!("Excluding fixture file: {}", e);
                outcome.errors.push(e);
            }
        }
    }

    outcome.files.sort_by(|a, b| a.file_path.cmp(&b.file_path));
    debug!(
        "Scanned {} fixture files ({} failed)",
        outcome.files.len(),
        outcome.errors.len()
    );
    outcome
}

/// Scan one fixture file for the components it references
pub fn scan_file(path: &Path) -> Result<FixtureFile> {
    let source = std::fs::read_to_string(path).map_err(|e| Error::Scan {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let dir = path.parent().unwrap_or_else(|| Path::new("/"));

    Ok(FixtureFile {
        file_path: slash(path),
        components: extract_components(&source, dir),
    })
}

/// Component references in `source`, in order of first use, without duplicates
pub fn extract_components(source: &str, dir: &Path) -> Vec<ComponentRef> {
    let bindings = collect_bindings(source);
    let mut components: Vec<ComponentRef> = Vec::new();

    for cap in COMPONENT_USAGE.captures_iter(source) {
        let local = &cap[1];
        let Some(binding) = bindings.get(local) else {
            debug!("component `{}` is not an imported binding", local);
            continue;
        };

        let component = ComponentRef::new(
            binding.display_name.clone(),
            resolve_module(dir, &binding.specifier),
        );
        if !components.contains(&component) {
            components.push(component);
        }
    }

    components
}

fn collect_bindings(source: &str) -> HashMap<String, Binding> {
    let mut bindings = HashMap::new();

    for cap in DEFAULT_IMPORT.captures_iter(source) {
        let specifier = cap[3].to_string();
        bindings.insert(
            cap[1].to_string(),
            Binding {
                display_name: cap[1].to_string(),
                specifier: specifier.clone(),
            },
        );
        if let Some(named) = cap.get(2) {
            add_named(&mut bindings, named.as_str(), &specifier);
        }
    }

    for cap in NAMED_IMPORT.captures_iter(source) {
        add_named(&mut bindings, &cap[1], &cap[2]);
    }

    for cap in REQUIRE.captures_iter(source) {
        bindings.insert(
            cap[1].to_string(),
            Binding {
                display_name: cap[1].to_string(),
                specifier: cap[2].to_string(),
            },
        );
    }

    bindings
}

/// `{ Foo, Bar as Baz }` binds `Foo` and `Baz`, both displayed by export name
fn add_named(bindings: &mut HashMap<String, Binding>, list: &str, specifier: &str) {
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (exported, local) = match item.split_once(" as ") {
            Some((exported, local)) => (exported.trim(), local.trim()),
            None => (item, item),
        };
        bindings.insert(
            local.to_string(),
            Binding {
                display_name: exported.to_string(),
                specifier: specifier.to_string(),
            },
        );
    }
}

/// Resolve a module specifier the way a bundler would, as far as the
/// filesystem allows. Package specifiers are returned untouched.
pub fn resolve_module(dir: &Path, specifier: &str) -> String {
    if !specifier.starts_with('.') && !specifier.starts_with('/') {
        return specifier.to_string();
    }

    let base = normalize(&dir.join(specifier));
    slash(&find_module_file(&base).unwrap_or(base))
}

/// `base`, `base.{ext}` or `base/index.{ext}`, whichever exists first
pub fn find_module_file(base: &Path) -> Option<PathBuf> {
    if base.is_file() {
        return Some(base.to_path_buf());
    }

    let with_ext = MODULE_EXTENSIONS.iter().map(|ext| {
        let mut name = base.as_os_str().to_owned();
        name.push(".");
        name.push(ext);
        PathBuf::from(name)
    });
    let index = MODULE_EXTENSIONS
        .iter()
        .map(|ext| base.join(format!("index.{}", ext)));

    with_ext.chain(index).find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_import_component() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("MyComponent.js"), "export default () => null;").unwrap();

        let source = r#"
import MyComponent from './MyComponent';

export default {
  component: MyComponent,
  props: { name: 'Jack' }
};
"#;
        let components = extract_components(source, tmp.path());
        assert_eq!(
            components,
            vec![ComponentRef::new(
                "MyComponent",
                slash(&tmp.path().join("MyComponent.js"))
            )]
        );
    }

    #[test]
    fn test_named_require_and_packages() {
        let source = r#"
import React from 'react';
import { Button, Card as Panel } from '../ui';
const Legacy = require("./legacy/Legacy");

export default [
  { component: Button, props: {} },
  { component: Panel, props: {} },
  { component: Legacy },
  { component: Button, props: { disabled: true } },
  { component: NotImported }
];
"#;
        let components = extract_components(source, Path::new("/p/src/fixtures"));
        assert_eq!(
            components,
            vec![
                ComponentRef::new("Button", "/p/src/ui"),
                ComponentRef::new("Card", "/p/src/ui"),
                ComponentRef::new("Legacy", "/p/src/fixtures/legacy/Legacy"),
            ]
        );
    }

    #[test]
    fn test_package_component_keeps_specifier() {
        let source = "import { Select } from 'some-ui-kit';\nexport default { component: Select };";
        let components = extract_components(source, Path::new("/p"));
        assert_eq!(components, vec![ComponentRef::new("Select", "some-ui-kit")]);
    }

    #[test]
    fn test_resolves_index_files() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("Header")).unwrap();
        fs::write(tmp.path().join("Header/index.tsx"), "").unwrap();

        assert_eq!(
            resolve_module(tmp.path(), "./Header"),
            slash(&tmp.path().join("Header/index.tsx"))
        );
    }

    #[test]
    fn test_unreadable_file_is_scan_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("binary.fixture.js");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let err = scan_file(&path).unwrap_err();
        assert!(matches!(err, Error::Scan { .. }));
    }

    #[test]
    fn test_scan_project_excludes_failures() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("Good.fixture.js"), "export default {};").unwrap();
        fs::write(tmp.path().join("Bad.fixture.js"), [0xff, 0xfe]).unwrap();

        let config = cosmos_common::CosmosConfig::for_root(tmp.path()).unwrap();
        let outcome = scan_project(&FileMatcher::new(&config).unwrap());

        assert_eq!(outcome.files.len(), 1);
        assert!(outcome.files[0].file_path.ends_with("Good.fixture.js"));
        assert!(outcome.files[0].components.is_empty());
        assert_eq!(outcome.errors.len(), 1);
    }
}
