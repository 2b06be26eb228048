//! Ingested content items.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::state::ItemState;

/// Deterministic item identity: SHA256("{adapter}:{upstream_id}")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash an upstream identifier under the adapter that produced it
    pub fn compute(adapter_name: &str, upstream_id: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(adapter_name.as_bytes());
        hasher.update(b":");
        hasher.update(upstream_id.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap an already computed hash (e.g. read back from the store)
    pub fn from_hex(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an item's body should be normalized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    #[default]
    Article,
    Slideshow,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Article => write!(f, "article"),
            ContentKind::Slideshow => write!(f, "slideshow"),
        }
    }
}

impl FromStr for ContentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "article" | "post" => Ok(ContentKind::Article),
            "slideshow" | "gallery" => Ok(ContentKind::Slideshow),
            _ => anyhow::bail!("Unknown content kind: {}", s),
        }
    }
}

/// Small denormalized summary kept alongside the full payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
}

/// A persisted item row
#[derive(Debug, Clone, PartialEq)]
pub struct ContentItem {
    pub content_hash: ContentHash,
    pub source: String,
    pub platform: String,
    pub feed_type: String,
    pub state: ItemState,

    /// Set once at first insertion
    pub ingested_at: DateTime<Utc>,

    pub item_published_at: Option<DateTime<Utc>>,
    pub item_modified_at: Option<DateTime<Utc>>,
    pub metadata: ItemMetadata,

    /// Complete upstream payload as captured at ingestion
    pub full_content: serde_json::Value,
}

/// Input for inserting a freshly ingested row
#[derive(Debug, Clone)]
pub struct NewItem {
    pub content_hash: ContentHash,
    pub source: String,
    pub platform: String,
    pub feed_type: String,
    pub ingested_at: DateTime<Utc>,
    pub revision: ItemRevision,
}

/// The upstream-owned fields a reconciliation may rewrite
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRevision {
    pub item_published_at: Option<DateTime<Utc>>,
    pub item_modified_at: Option<DateTime<Utc>>,
    pub metadata: ItemMetadata,
    pub full_content: serde_json::Value,
}
