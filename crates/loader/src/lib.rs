//! Cosmos Loader
//!
//! Renders fixtures in isolation through a linked chain of proxies. Proxies
//! wrap rendering with cross-cutting behavior (prop injection, mocking,
//! instrumentation); the chain always ends in [`PropsProxy`], which hands the
//! fixture's props to the external [`Renderer`].

pub mod chain;
pub mod error;
pub mod loader;
pub mod proxy;

pub use chain::{NextProxy, ProxyChain, ProxyNode};
pub use error::{RenderError, Result};
pub use loader::Loader;
pub use proxy::{ComponentHandle, PropsProxy, Proxy, ProxyProps, Rendered, Renderer};
