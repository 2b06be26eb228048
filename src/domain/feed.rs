//! Normalized item bodies and feed entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::{ContentHash, ContentItem};
use super::state::ItemState;

/// One slide of a segmented slideshow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    /// Resolved image URL of the slide anchor
    pub image_url: String,

    /// Text of the heading that follows the anchor (empty if none)
    pub title: String,

    /// Markup between the heading and the next anchor
    pub body: String,

    /// Figure caption / attribution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Result of structural segmentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedBody {
    pub is_slideshow: bool,

    /// Original markup (unchanged for articles)
    pub body: String,

    /// Plain text preceding the first slide
    #[serde(default)]
    pub intro: String,

    #[serde(default)]
    pub slides: Vec<Slide>,
}

impl NormalizedBody {
    /// Article-shaped body: the markup passes through untouched
    pub fn article(body: impl Into<String>) -> Self {
        Self {
            is_slideshow: false,
            body: body.into(),
            intro: String::new(),
            slides: Vec::new(),
        }
    }
}

/// Normalized, filter-approved representation stored on published rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedData {
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    pub body: NormalizedBody,
}

/// An entry of the output feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub content_hash: ContentHash,

    /// Upstream publish date, used for freshness ordering
    pub published_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub data: ProcessedData,
}

impl FeedItem {
    pub fn new(content_hash: ContentHash, published_at: Option<DateTime<Utc>>, data: ProcessedData) -> Self {
        Self {
            content_hash,
            published_at,
            data,
        }
    }

    /// Build a feed entry from a stored row; `None` unless the row is published
    pub fn from_published(item: ContentItem) -> Option<Self> {
        match item.state {
            ItemState::Published { processed, .. } => Some(Self::new(
                item.content_hash,
                item.item_published_at,
                processed,
            )),
            _ => None,
        }
    }
}
