//! Rendering errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Renderer failed for {component}: {reason}")]
    Renderer { component: String, reason: String },

    #[error("Proxy {proxy} failed: {reason}")]
    Proxy { proxy: String, reason: String },

    #[error("Proxy {proxy} neither rendered nor delegated")]
    Incomplete { proxy: String },

    #[error("Delegated past the end of the proxy chain")]
    ChainEnded,
}
