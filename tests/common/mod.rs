//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use feedmill::sources::{ContentSource, Platform, SourceError, SourcePage};
use feedmill::SourceConfig;
use serde_json::{json, Value};

/// In-memory upstream serving fixed pages of WordPress-shaped posts
pub struct ScriptedSource {
    pages: Vec<Vec<Value>>,
    requested: Mutex<Vec<u32>>,
}

impl ScriptedSource {
    pub fn new(pages: Vec<Vec<Value>>) -> Self {
        Self {
            pages,
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Split `posts` into pages of `per_page`
    pub fn paged(posts: Vec<Value>, per_page: usize) -> Self {
        Self::new(posts.chunks(per_page).map(<[Value]>::to_vec).collect())
    }

    /// Pages requested so far, in order
    pub fn requested(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentSource for ScriptedSource {
    fn platform(&self) -> Platform {
        Platform::WordPress
    }

    async fn fetch_page(&self, page: u32) -> Result<SourcePage, SourceError> {
        self.requested.lock().unwrap().push(page);
        Ok(SourcePage {
            entries: self.pages.get(page as usize - 1).cloned().unwrap_or_default(),
            total_pages: self.pages.len() as u32,
        })
    }
}

/// A WordPress post as returned by `/wp-json/wp/v2/posts?_embed=1`
pub fn wp_post(id: u64, title: &str, body: &str, date: &str, modified: Option<&str>) -> Value {
    json!({
        "id": id,
        "date_gmt": date,
        "modified_gmt": modified,
        "link": format!("https://example.com/?p={}", id),
        "title": { "rendered": title },
        "excerpt": { "rendered": format!("<p>About {}</p>\n", title) },
        "content": { "rendered": body },
        "_embedded": {
            "author": [{ "name": "Editor" }],
            "wp:featuredmedia": [{ "source_url": format!("https://example.com/img/{}.jpg", id) }]
        }
    })
}

/// `count` posts with ids starting at 1 and distinct publish days
pub fn wp_posts(count: u64) -> Vec<Value> {
    (1..=count)
        .map(|id| {
            wp_post(
                id,
                &format!("Post {}", id),
                "<p>Plain body</p>",
                &format!("2024-01-{:02}T08:00:00", (id % 28) + 1),
                Some("2024-02-01T00:00:00"),
            )
        })
        .collect()
}

pub fn source_config(name: &str) -> SourceConfig {
    SourceConfig::new(name, Platform::WordPress, "news", "https://example.com")
}
