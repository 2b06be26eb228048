//! Adapter interfaces for external collaborators.
//!
//! The run only needs a yes/no cleanliness decision, a renderer, somewhere to
//! put the rendered document and, optionally, a cache to invalidate. Each is a
//! narrow trait so deployments can swap in their own implementation.

pub mod json_renderer;
pub mod local_sink;
pub mod term_list;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::SiteMetadata;
use crate::domain::FeedItem;

pub use json_renderer::JsonRenderer;
pub use local_sink::LocalDirSink;
pub use term_list::TermListOracle;

/// Decides whether a candidate text may be published
pub trait CleanlinessOracle: Send + Sync {
    fn is_clean(&self, candidate: &str) -> bool;
}

/// A rendered feed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    /// MIME type of `body`
    pub content_type: String,

    /// File extension used when naming the stored object
    pub extension: String,

    pub body: String,
}

/// Turns the assembled feed into an output document
pub trait Renderer: Send + Sync {
    fn render(&self, items: &[FeedItem], site: &SiteMetadata) -> Result<RenderedDocument>;
}

/// Stores a rendered document under a name, returning where it landed
#[async_trait]
pub trait ObjectSink: Send + Sync {
    async fn store(&self, name: &str, document: &RenderedDocument) -> Result<String>;
}

/// Invalidates a cached path after a new document is stored
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate(&self, path: &str) -> Result<()>;
}
