//! Upstream content sources.
//!
//! A source yields pages of raw entries. Each platform knows how to turn one
//! raw entry into a `RawRecord` (identity, timestamps, metadata) and where the
//! article body lives inside the stored payload.

pub mod wordpress;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ItemMetadata;

pub use wordpress::WordPressSource;

/// Errors produced while fetching or decoding upstream content
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {status} for page {page}: {body}")]
    Status { status: u16, page: u32, body: String },

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),
}

/// Upstream platform. Its name is the adapter name mixed into content hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(alias = "wp")]
    WordPress,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::WordPress => "wordpress",
        }
    }

    /// Decode one raw upstream entry
    pub fn parse_record(&self, entry: &serde_json::Value) -> Result<RawRecord, SourceError> {
        match self {
            Platform::WordPress => wordpress::parse_post(entry),
        }
    }

    /// Locate the raw body markup inside a stored payload
    pub fn body_of<'a>(&self, payload: &'a serde_json::Value) -> Option<&'a str> {
        match self {
            Platform::WordPress => wordpress::post_body(payload),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wordpress" | "wp" => Ok(Platform::WordPress),
            other => Err(SourceError::UnknownPlatform(other.to_string())),
        }
    }
}

/// One decoded upstream record
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub upstream_id: String,
    pub published_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub metadata: ItemMetadata,

    /// Complete upstream entry
    pub payload: serde_json::Value,
}

/// One page of raw upstream entries
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    pub entries: Vec<serde_json::Value>,

    /// Total number of pages reported by the upstream
    pub total_pages: u32,
}

/// Trait for paginated upstream platforms
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Platform of the entries this source yields
    fn platform(&self) -> Platform;

    /// Fetch a page of entries (pages start at 1)
    async fn fetch_page(&self, page: u32) -> Result<SourcePage, SourceError>;
}
