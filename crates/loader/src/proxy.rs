//! Proxy (decorator) contract and the terminal props proxy

use crate::chain::NextProxy;
use crate::error::{RenderError, Result};
use cosmos_common::Fixture;
use serde_json::{Map, Value};

/// Handle to one rendered component instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentHandle {
    pub component: String,
    pub instance_id: u64,
}

/// Output of a completed render
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub component: String,
    pub output: String,
    /// Absent when the target has no instantiable handle
    pub handle: Option<ComponentHandle>,
}

/// External component renderer
pub trait Renderer {
    fn render(&self, component: &str, props: &Map<String, Value>) -> Result<Rendered>;
}

/// Everything a proxy receives besides the rest of the chain.
///
/// All fields are borrows, so a proxy can derive a modified copy with struct
/// update syntax and hand it to the next node.
#[derive(Clone, Copy)]
pub struct ProxyProps<'a> {
    pub fixture: &'a Fixture,
    pub renderer: &'a dyn Renderer,
    /// Called at most once per render with the rendered instance
    pub on_component_ref: &'a dyn Fn(&ComponentHandle),
    /// Called whenever a proxy produces a new fixture value
    pub on_fixture_update: &'a dyn Fn(&Fixture),
}

/// A rendering decorator.
///
/// A proxy must either delegate to `next` or produce a [`Rendered`] itself.
/// State must not outlive one `render` call.
pub trait Proxy: Send + Sync {
    fn name(&self) -> &str;

    fn render(&self, next: NextProxy<'_>, props: ProxyProps<'_>) -> Result<Rendered>;
}

/// Terminal proxy: renders the fixture's component with the fixture's props
#[derive(Debug, Default, Clone, Copy)]
pub struct PropsProxy;

impl Proxy for PropsProxy {
    fn name(&self) -> &str {
        "PropsProxy"
    }

    fn render(&self, _next: NextProxy<'_>, props: ProxyProps<'_>) -> Result<Rendered> {
        let fixture = props.fixture;
        if fixture.component.is_empty() {
            return Err(RenderError::Proxy {
                proxy: self.name().to_string(),
                reason: "fixture does not name a component".to_string(),
            });
        }

        let rendered = props.renderer.render(&fixture.component, &fixture.props)?;
        if let Some(handle) = &rendered.handle {
            (props.on_component_ref)(handle);
        }
        Ok(rendered)
    }
}
