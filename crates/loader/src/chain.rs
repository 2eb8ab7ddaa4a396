//! Linked proxy chain
//!
//! The chain owns its proxies in order; nodes are cheap `(chain, index)`
//! cursors, so "the rest of the chain" is just the next index.

use crate::error::{RenderError, Result};
use crate::proxy::{PropsProxy, Proxy, ProxyProps, Rendered};
use std::sync::Arc;

/// Ordered proxies ending in the terminal [`PropsProxy`]
#[derive(Clone)]
pub struct ProxyChain {
    proxies: Vec<Arc<dyn Proxy>>,
}

impl ProxyChain {
    /// Append the terminal proxy to `proxies` and link them in order
    pub fn compose<I>(proxies: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Proxy>>,
    {
        let mut proxies: Vec<Arc<dyn Proxy>> = proxies.into_iter().collect();
        proxies.push(Arc::new(PropsProxy));
        Self { proxies }
    }

    pub fn head(&self) -> ProxyNode<'_> {
        ProxyNode {
            chain: self,
            index: 0,
        }
    }

    /// Number of nodes, terminal included
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    /// A chain always holds at least the terminal proxy
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Walk the nodes from head to terminal
    pub fn iter(&self) -> impl Iterator<Item = ProxyNode<'_>> {
        std::iter::successors(Some(self.head()), |node| node.next())
    }
}

impl std::fmt::Debug for ProxyChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.proxies.iter().map(|p| p.name()))
            .finish()
    }
}

/// One position in a [`ProxyChain`]
#[derive(Clone, Copy)]
pub struct ProxyNode<'a> {
    chain: &'a ProxyChain,
    index: usize,
}

impl<'a> ProxyNode<'a> {
    pub fn value(&self) -> &'a dyn Proxy {
        self.chain.proxies[self.index].as_ref()
    }

    pub fn next(&self) -> Option<ProxyNode<'a>> {
        let index = self.index + 1;
        (index < self.chain.proxies.len()).then_some(ProxyNode {
            chain: self.chain,
            index,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_terminal(&self) -> bool {
        self.index + 1 == self.chain.proxies.len()
    }

    /// Render starting at this node
    pub fn render(&self, props: ProxyProps<'_>) -> Result<Rendered> {
        self.value().render(NextProxy(self.next()), props)
    }
}

/// The remainder of the chain as seen by a proxy
#[derive(Clone, Copy)]
pub struct NextProxy<'a>(Option<ProxyNode<'a>>);

impl<'a> NextProxy<'a> {
    pub fn node(&self) -> Option<ProxyNode<'a>> {
        self.0
    }

    /// Delegate rendering to the next node
    pub fn render(&self, props: ProxyProps<'_>) -> Result<Rendered> {
        match self.0 {
            Some(node) => node.render(props),
            None => Err(RenderError::ChainEnded),
        }
    }
}
