//! Fixture loader
//!
//! Renders a fixture through the user's proxies and the terminal props proxy.

use crate::chain::ProxyChain;
use crate::error::Result;
use crate::proxy::{ComponentHandle, Proxy, ProxyProps, Rendered, Renderer};
use cosmos_common::Fixture;
use std::cell::Cell;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Loader {
    chain: ProxyChain,
}

impl Loader {
    pub fn new<I>(proxies: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Proxy>>,
    {
        let chain = ProxyChain::compose(proxies);
        debug!("Loader composed proxy chain {:?}", chain);
        Self { chain }
    }

    pub fn chain(&self) -> &ProxyChain {
        &self.chain
    }

    /// Render without observing component refs or fixture updates
    pub fn render_fixture(&self, fixture: &Fixture, renderer: &dyn Renderer) -> Result<Rendered> {
        self.render(fixture, renderer, |_| {}, |_| {})
    }

    /// Render `fixture` through the whole chain.
    ///
    /// `on_component_ref` fires at most once even if a proxy renders the
    /// rest of the chain more than once. Fixture updates from any proxy
    /// reach `on_fixture_update` unchanged. Errors are returned to the
    /// caller as-is; nothing is retried.
    pub fn render<R, U>(
        &self,
        fixture: &Fixture,
        renderer: &dyn Renderer,
        on_component_ref: R,
        on_fixture_update: U,
    ) -> Result<Rendered>
    where
        R: Fn(&ComponentHandle),
        U: Fn(&Fixture),
    {
        let ref_reported = Cell::new(false);
        let component_ref_once = |handle: &ComponentHandle| {
            if !ref_reported.replace(true) {
                on_component_ref(handle);
            }
        };

        let props = ProxyProps {
            fixture,
            renderer,
            on_component_ref: &component_ref_once,
            on_fixture_update: &on_fixture_update,
        };

        self.chain.head().render(props).inspect_err(|e| {
            warn!("Rendering {} failed: {}", fixture.component, e);
        })
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
