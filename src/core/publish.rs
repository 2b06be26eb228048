//! Publication pipeline.
//!
//! Decides pending rows in ingestion order: each row is normalized, checked
//! by the cleanliness oracle and moved to `published` or `skipped`. A failure
//! on one row only skips that row; store failures abort the run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::adapters::CleanlinessOracle;
use crate::config::{RunLimits, SourceConfig};
use crate::domain::{ContentItem, FeedItem, NormalizedBody, ProcessedData, SkipReason, Transition};
use crate::segment::{decode_entities, strip_tags, Segmenter};
use crate::sources::{Platform, SourceError};
use crate::store::{current_time, ContentStore, StoreError};

/// Cooperative cancellation, checked between items
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Reasons a single row cannot be normalized
#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Platform(#[from] SourceError),

    #[error("payload has no body")]
    MissingBody,
}

/// Outcome of one publication pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublicationReport {
    /// Rows decided this pass (published or skipped)
    pub processed: usize,
    pub skipped: usize,

    /// Rows published this pass, in decision order
    pub feed_items: Vec<FeedItem>,

    /// True if the pass stopped early on cancellation
    pub cancelled: bool,
}

/// How many pending rows one pass may decide
pub fn processing_limit(limits: &RunLimits, is_new_source: bool) -> usize {
    if is_new_source {
        limits.onboarding_limit
    } else {
        limits.per_run_limit
    }
}

pub struct PublicationPipeline<'a> {
    store: &'a ContentStore,
    oracle: &'a dyn CleanlinessOracle,
    cancel: CancelFlag,
}

impl<'a> PublicationPipeline<'a> {
    pub fn new(store: &'a ContentStore, oracle: &'a dyn CleanlinessOracle) -> Self {
        Self {
            store,
            oracle,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    #[instrument(skip(self, config), fields(source = %config.name))]
    pub fn run(&self, config: &SourceConfig, is_new_source: bool) -> Result<PublicationReport, StoreError> {
        let limit = processing_limit(&config.limits, is_new_source);
        let pending = self.store.select_pending(&config.name, &config.feed_type, limit)?;
        let segmenter = Segmenter::new(config.heading_level);

        info!(limit, pending = pending.len(), "Starting publication");

        let mut report = PublicationReport::default();
        for item in pending {
            if self.cancel.is_cancelled() {
                warn!(processed = report.processed, "Publication cancelled");
                report.cancelled = true;
                break;
            }

            let transition = match normalize_item(&item, config, &segmenter) {
                Ok(processed) if self.oracle.is_clean(&candidate_text(&processed)) => {
                    Transition::Publish(processed)
                }
                Ok(_) => Transition::Skip(SkipReason::Profanity),
                Err(e) => {
                    warn!(hash = %item.content_hash, error = %e, "Failed to normalize item");
                    Transition::Skip(SkipReason::Error(e.to_string()))
                }
            };

            let state = self
                .store
                .transition_status(&item.content_hash, &item.source, transition, current_time())?;

            report.processed += 1;
            let decided = ContentItem { state, ..item };
            debug!(hash = %decided.content_hash, status = %decided.state.status(), "Item decided");

            match FeedItem::from_published(decided) {
                Some(feed_item) => report.feed_items.push(feed_item),
                None => report.skipped += 1,
            }
        }

        info!(
            processed = report.processed,
            published = report.feed_items.len(),
            skipped = report.skipped,
            "Publication complete"
        );

        Ok(report)
    }
}

/// Build the published form of a row from its stored payload
pub fn normalize_item(
    item: &ContentItem,
    config: &SourceConfig,
    segmenter: &Segmenter,
) -> Result<ProcessedData, ItemError> {
    let platform: Platform = item.platform.parse()?;
    let raw_body = platform
        .body_of(&item.full_content)
        .ok_or(ItemError::MissingBody)?;

    let meta = &item.metadata;
    let description = meta
        .excerpt
        .as_deref()
        .map(|excerpt| decode_entities(excerpt).trim().to_string())
        .filter(|d| !d.is_empty());

    Ok(ProcessedData {
        title: decode_entities(&meta.title).trim().to_string(),
        description,
        link: meta.link.clone(),
        author: meta.author.clone(),
        image: meta.featured_image.clone(),
        body: segmenter.normalize(raw_body, config.content_kind),
    })
}

/// All user-visible text of a normalized item, joined for the oracle
pub fn candidate_text(data: &ProcessedData) -> String {
    let mut parts = vec![data.title.clone()];
    parts.extend(data.description.clone());
    parts.extend(body_text(&data.body));
    parts.join("\n")
}

fn body_text(body: &NormalizedBody) -> Vec<String> {
    if !body.is_slideshow {
        return vec![strip_tags(&body.body)];
    }

    let mut parts = vec![body.intro.clone()];
    for slide in &body.slides {
        parts.push(slide.title.clone());
        parts.push(strip_tags(&slide.body));
        parts.extend(slide.caption.clone());
    }
    parts
}
