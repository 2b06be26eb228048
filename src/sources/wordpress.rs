//! WordPress REST source.
//!
//! Pages through `/wp-json/wp/v2/posts` with `_embed` so author names and
//! featured media come back inline. The total page count is read from the
//! `X-WP-TotalPages` response header.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use super::{ContentSource, Platform, RawRecord, SourceError, SourcePage};
use crate::config::SourceConfig;
use crate::domain::ItemMetadata;

const TOTAL_PAGES_HEADER: &str = "X-WP-TotalPages";

/// Error code WordPress answers with when a page past the end is requested
const INVALID_PAGE_CODE: &str = "rest_post_invalid_page_number";

/// WordPress REST API client for one site
pub struct WordPressSource {
    base_url: String,
    per_page: u32,
    categories: Vec<u64>,
    tags: Vec<u64>,
    client: reqwest::Client,
}

impl WordPressSource {
    /// Create a source for the site at `base_url`
    pub fn new(base_url: impl Into<String>, per_page: u32) -> Self {
        Self {
            base_url: base_url.into(),
            per_page,
            categories: Vec::new(),
            tags: Vec::new(),
            client: reqwest::Client::new(),
        }
    }

    /// Create from a source configuration
    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(config.url.clone(), config.per_page)
            .with_categories(config.categories.clone())
            .with_tags(config.tags.clone())
    }

    pub fn with_categories(mut self, categories: Vec<u64>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_tags(mut self, tags: Vec<u64>) -> Self {
        self.tags = tags;
        self
    }

    fn posts_url(&self) -> String {
        format!("{}/wp-json/wp/v2/posts", self.base_url.trim_end_matches('/'))
    }

    fn query(&self, page: u32) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("page", page.to_string()),
            ("per_page", self.per_page.to_string()),
            ("_embed", "1".to_string()),
        ];
        if !self.categories.is_empty() {
            query.push(("categories", join_ids(&self.categories)));
        }
        if !self.tags.is_empty() {
            query.push(("tags", join_ids(&self.tags)));
        }
        query
    }
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",")
}

#[async_trait]
impl ContentSource for WordPressSource {
    fn platform(&self) -> Platform {
        Platform::WordPress
    }

    async fn fetch_page(&self, page: u32) -> Result<SourcePage, SourceError> {
        debug!(page, url = %self.posts_url(), "Fetching WordPress page");

        let response = self
            .client
            .get(self.posts_url())
            .query(&self.query(page))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            // Asking past the last page is an empty page, not a failure
            if status == StatusCode::BAD_REQUEST && body.contains(INVALID_PAGE_CODE) {
                return Ok(SourcePage {
                    entries: Vec::new(),
                    total_pages: page.saturating_sub(1),
                });
            }

            return Err(SourceError::Status {
                status: status.as_u16(),
                page,
                body,
            });
        }

        let total_pages = response
            .headers()
            .get(TOTAL_PAGES_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(1);

        let entries: Vec<Value> = response.json().await?;

        Ok(SourcePage {
            entries,
            total_pages,
        })
    }
}

/// `content.rendered` of a post payload
pub fn post_body(payload: &Value) -> Option<&str> {
    rendered(payload, "content")
}

fn rendered<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload.get(field)?.get("rendered")?.as_str()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// WordPress `*_gmt` fields carry no offset; anything else must be RFC 3339
fn parse_date(payload: &Value, field: &str) -> Result<Option<DateTime<Utc>>, SourceError> {
    let raw = match payload.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(raw)) if raw.is_empty() => return Ok(None),
        Some(Value::String(raw)) => raw,
        Some(other) => {
            return Err(SourceError::MalformedRecord(format!(
                "{} is not a string: {}",
                field, other
            )))
        }
    };

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Some(naive.and_utc()));
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|t| Some(t.with_timezone(&Utc)))
        .map_err(|e| SourceError::MalformedRecord(format!("invalid {} '{}': {}", field, raw, e)))
}

/// Decode one post from the `/posts` listing
pub fn parse_post(payload: &Value) -> Result<RawRecord, SourceError> {
    let upstream_id = match payload.get("id") {
        Some(Value::Number(id)) => id.to_string(),
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        _ => return Err(SourceError::MalformedRecord("post without id".to_string())),
    };

    if post_body(payload).is_none() {
        return Err(SourceError::MalformedRecord(format!(
            "post {} has no content.rendered",
            upstream_id
        )));
    }

    let metadata = ItemMetadata {
        title: rendered(payload, "title").unwrap_or_default().trim().to_string(),
        link: non_empty(payload.get("link").and_then(Value::as_str)),
        author: non_empty(
            payload
                .pointer("/_embedded/author/0/name")
                .and_then(Value::as_str),
        ),
        excerpt: non_empty(rendered(payload, "excerpt")),
        featured_image: non_empty(
            payload
                .pointer("/_embedded/wp:featuredmedia/0/source_url")
                .and_then(Value::as_str),
        ),
    };

    Ok(RawRecord {
        published_at: parse_date(payload, "date_gmt")?,
        modified_at: parse_date(payload, "modified_gmt")?,
        upstream_id,
        metadata,
        payload: payload.clone(),
    })
}
