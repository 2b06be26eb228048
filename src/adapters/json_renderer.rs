//! JSON feed renderer.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{RenderedDocument, Renderer};
use crate::config::SiteMetadata;
use crate::domain::FeedItem;

#[derive(Serialize)]
struct FeedDocument<'a> {
    site: &'a SiteMetadata,
    generated_at: DateTime<Utc>,
    items: &'a [FeedItem],
}

/// Renders the feed as a pretty-printed JSON document
#[derive(Debug, Clone, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, items: &[FeedItem], site: &SiteMetadata) -> Result<RenderedDocument> {
        let document = FeedDocument {
            site,
            generated_at: Utc::now(),
            items,
        };

        let body = serde_json::to_string_pretty(&document).context("Failed to serialize feed")?;

        Ok(RenderedDocument {
            content_type: "application/json".to_string(),
            extension: "json".to_string(),
            body,
        })
    }
}
