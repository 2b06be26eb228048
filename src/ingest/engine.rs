//! Paginated ingestion with per-record reconciliation.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::SourceConfig;
use crate::domain::{ContentHash, ItemRevision, NewItem};
use crate::sources::{ContentSource, RawRecord, SourceError};
use crate::store::{current_time, to_stored_precision, ContentStore, StoreError};

/// Failures that abort an ingestion pass
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Counters for one ingestion pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Records returned by the upstream, malformed ones included
    pub total_seen: usize,
    pub total_new: usize,
    pub total_updated: usize,
    pub total_failed: usize,

    /// True when the store held no rows for this source before the pass
    pub is_new_source: bool,
}

/// Outcome of reconciling one record with its stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Inserted,
    Updated { reopened: bool },
    Unchanged,
}

/// Pulls records from a source into the content store
pub struct IngestionEngine<'a> {
    store: &'a ContentStore,
}

impl<'a> IngestionEngine<'a> {
    pub fn new(store: &'a ContentStore) -> Self {
        Self { store }
    }

    /// Fetch every page of `source` and reconcile each record
    #[instrument(skip(self, config, source), fields(source = %config.name))]
    pub async fn ingest(
        &self,
        config: &SourceConfig,
        source: &dyn ContentSource,
    ) -> Result<IngestReport, IngestError> {
        let platform = source.platform();

        let existing = self
            .store
            .count_by_source_triple(&config.name, platform.as_str(), &config.feed_type)?;

        let mut report = IngestReport {
            is_new_source: existing == 0,
            ..Default::default()
        };

        let mut page = 1;
        loop {
            let fetched = source.fetch_page(page).await?;
            if fetched.entries.is_empty() {
                debug!(page, total_pages = fetched.total_pages, "Empty page");
            }

            for entry in &fetched.entries {
                report.total_seen += 1;

                let record = match platform.parse_record(entry) {
                    Ok(record) => record,
                    Err(e) => {
                        warn!(page, error = %e, "Skipping malformed record");
                        report.total_failed += 1;
                        continue;
                    }
                };

                match self.reconcile(config, platform.as_str(), record)? {
                    Reconciled::Inserted => report.total_new += 1,
                    Reconciled::Updated { .. } => report.total_updated += 1,
                    Reconciled::Unchanged => {}
                }
            }

            if page >= fetched.total_pages {
                break;
            }
            page += 1;
        }

        info!(
            seen = report.total_seen,
            new = report.total_new,
            updated = report.total_updated,
            failed = report.total_failed,
            new_source = report.is_new_source,
            "Ingestion complete"
        );

        Ok(report)
    }

    /// Insert, update or leave alone the stored row for one record.
    ///
    /// An update only sends the row back to pending when the stored row had
    /// no modification timestamp; otherwise its prior decision stands.
    pub fn reconcile(
        &self,
        config: &SourceConfig,
        adapter_name: &str,
        record: RawRecord,
    ) -> Result<Reconciled, StoreError> {
        let hash = ContentHash::compute(adapter_name, &record.upstream_id);

        let revision = ItemRevision {
            item_published_at: record.published_at.map(to_stored_precision),
            item_modified_at: record.modified_at.map(to_stored_precision),
            metadata: record.metadata,
            full_content: record.payload,
        };

        let Some(stored) = self.store.find_by_key(&hash, &config.name)? else {
            self.store.insert(&NewItem {
                content_hash: hash,
                source: config.name.clone(),
                platform: adapter_name.to_string(),
                feed_type: config.feed_type.clone(),
                ingested_at: current_time(),
                revision,
            })?;
            return Ok(Reconciled::Inserted);
        };

        if stored.item_modified_at == revision.item_modified_at {
            return Ok(Reconciled::Unchanged);
        }

        let reopened = stored.item_modified_at.is_none();
        if reopened {
            self.store.update_and_reopen(&hash, &config.name, &revision)?;
        } else {
            self.store.update_keeping_status(&hash, &config.name, &revision)?;
        }

        debug!(hash = %hash, reopened, "Updated modified record");
        Ok(Reconciled::Updated { reopened })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemMetadata, ItemStatus, NormalizedBody, ProcessedData, SkipReason, Transition};
    use crate::sources::{Platform, SourcePage};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    struct PagedSource {
        pages: Vec<Vec<serde_json::Value>>,
    }

    #[async_trait]
    impl ContentSource for PagedSource {
        fn platform(&self) -> Platform {
            Platform::WordPress
        }

        async fn fetch_page(&self, page: u32) -> Result<SourcePage, SourceError> {
            Ok(SourcePage {
                entries: self.pages.get(page as usize - 1).cloned().unwrap_or_default(),
                total_pages: self.pages.len() as u32,
            })
        }
    }

    fn post(id: u64, modified: &str) -> serde_json::Value {
        json!({
            "id": id,
            "date_gmt": "2024-01-01T10:00:00",
            "modified_gmt": modified,
            "link": format!("https://example.com/{}", id),
            "title": { "rendered": format!("Post {}", id) },
            "excerpt": { "rendered": "<p>Excerpt</p>" },
            "content": { "rendered": "<p>Body</p>" }
        })
    }

    fn config() -> SourceConfig {
        SourceConfig::new("acme", Platform::WordPress, "news", "https://example.com")
    }

    fn record(id: &str, modified: Option<chrono::DateTime<Utc>>) -> RawRecord {
        RawRecord {
            upstream_id: id.to_string(),
            published_at: None,
            modified_at: modified,
            metadata: ItemMetadata {
                title: format!("Post {}", id),
                ..Default::default()
            },
            payload: json!({ "id": id }),
        }
    }

    fn processed() -> ProcessedData {
        ProcessedData {
            title: "t".to_string(),
            description: None,
            link: None,
            author: None,
            image: None,
            body: NormalizedBody::article("b"),
        }
    }

    #[tokio::test]
    async fn test_ingest_pages_and_counts() {
        let store = ContentStore::open_in_memory().unwrap();
        let engine = IngestionEngine::new(&store);
        let source = PagedSource {
            pages: vec![
                vec![post(1, "2024-01-01T10:00:00"), post(2, "2024-01-01T10:00:00")],
                vec![post(3, "2024-01-01T10:00:00"), json!({ "title": "no id" })],
            ],
        };

        let report = engine.ingest(&config(), &source).await.unwrap();

        assert!(report.is_new_source);
        assert_eq!(report.total_seen, 4);
        assert_eq!(report.total_new, 3);
        assert_eq!(report.total_failed, 1);

        let again = engine.ingest(&config(), &source).await.unwrap();
        assert!(!again.is_new_source);
        assert_eq!(again.total_new, 0);
        assert_eq!(again.total_updated, 0);
    }

    #[tokio::test]
    async fn test_ingest_follows_total_pages_past_empty_page() {
        let store = ContentStore::open_in_memory().unwrap();
        let source = PagedSource {
            pages: vec![vec![post(1, "2024-01-01T10:00:00")], vec![], vec![post(9, "2024-01-01T10:00:00")]],
        };

        let report = IngestionEngine::new(&store).ingest(&config(), &source).await.unwrap();
        assert_eq!(report.total_seen, 2);
        assert_eq!(report.total_new, 2);
        assert!(store.find_by_key(&ContentHash::compute("wordpress", "9"), "acme").unwrap().is_some());
    }

    #[test]
    fn test_reconcile_ignores_sub_microsecond_digits() {
        let store = ContentStore::open_in_memory().unwrap();
        let engine = IngestionEngine::new(&store);
        let precise = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);

        engine.reconcile(&config(), "wordpress", record("1", Some(precise))).unwrap();
        let again = engine.reconcile(&config(), "wordpress", record("1", Some(precise))).unwrap();

        assert_eq!(again, Reconciled::Unchanged);
    }

    #[test]
    fn test_reconcile_unchanged_is_noop() {
        let store = ContentStore::open_in_memory().unwrap();
        let engine = IngestionEngine::new(&store);
        let modified = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let first = engine.reconcile(&config(), "wordpress", record("1", Some(modified))).unwrap();
        let second = engine.reconcile(&config(), "wordpress", record("1", Some(modified))).unwrap();

        assert_eq!(first, Reconciled::Inserted);
        assert_eq!(second, Reconciled::Unchanged);
    }

    #[test]
    fn test_modified_keeps_prior_decision() {
        let store = ContentStore::open_in_memory().unwrap();
        let engine = IngestionEngine::new(&store);
        let v1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let v2 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let hash = ContentHash::compute("wordpress", "1");

        engine.reconcile(&config(), "wordpress", record("1", Some(v1))).unwrap();
        store
            .transition_status(&hash, "acme", Transition::Publish(processed()), current_time())
            .unwrap();

        let outcome = engine.reconcile(&config(), "wordpress", record("1", Some(v2))).unwrap();
        assert_eq!(outcome, Reconciled::Updated { reopened: false });

        let row = store.find_by_key(&hash, "acme").unwrap().unwrap();
        assert_eq!(row.state.status(), ItemStatus::Published);
        assert_eq!(row.item_modified_at, Some(v2));
    }

    #[test]
    fn test_modified_after_missing_timestamp_reopens() {
        let store = ContentStore::open_in_memory().unwrap();
        let engine = IngestionEngine::new(&store);
        let v2 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let hash = ContentHash::compute("wordpress", "1");

        engine.reconcile(&config(), "wordpress", record("1", None)).unwrap();
        store
            .transition_status(&hash, "acme", Transition::Skip(SkipReason::Profanity), current_time())
            .unwrap();

        let outcome = engine.reconcile(&config(), "wordpress", record("1", Some(v2))).unwrap();
        assert_eq!(outcome, Reconciled::Updated { reopened: true });

        let row = store.find_by_key(&hash, "acme").unwrap().unwrap();
        assert!(row.state.is_pending());
    }
}
