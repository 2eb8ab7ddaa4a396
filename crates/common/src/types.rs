//! Core types for Cosmos

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A renderable unit referenced by one or more fixtures
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRef {
    /// Display name
    pub name: String,
    /// Module path of the component
    pub file_path: String,
}

impl ComponentRef {
    pub fn new(name: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_path: file_path.into(),
        }
    }
}

/// One discovered fixture file and the components it renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureFile {
    pub file_path: String,
    pub components: Vec<ComponentRef>,
}

/// A network response stub declared by a fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchMock {
    /// URL matcher, e.g. `end:/api/user`
    pub matcher: String,
    /// Status code or response body
    pub response: Value,
}

/// A single rendering scenario
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    /// Name of the component to render
    pub component: String,

    #[serde(default)]
    pub props: Map<String, Value>,

    /// Network mock directives
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fetch: Vec<FetchMock>,

    /// Anything else the fixture declares (state, context, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Fixture {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            ..Default::default()
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }
}

/// Options injected into the playground page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaygroundOpts {
    pub platform: String,
    pub project_key: String,
}

impl PlaygroundOpts {
    pub fn native(project_key: impl Into<String>) -> Self {
        Self {
            platform: "native".to_string(),
            project_key: project_key.into(),
        }
    }
}
