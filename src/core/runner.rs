//! End-to-end run for one source.
//!
//! A run takes the source's lock, ingests every upstream page, decides the
//! pending backlog, assembles the feed window and hands the rendered document
//! to the sink (and the cache invalidator, if one is configured).

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{CacheInvalidator, CleanlinessOracle, ObjectSink, Renderer};
use crate::config::SourceConfig;
use crate::ingest::{IngestError, IngestReport, IngestionEngine};
use crate::sources::ContentSource;
use crate::store::{ContentStore, StoreError};

use super::lock::RunLock;
use super::publish::{CancelFlag, PublicationPipeline};
use super::window;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Source '{0}' is already being processed by another run")]
    SourceLocked(String),

    #[error("Failed to acquire run lock: {0}")]
    Lock(#[from] io::Error),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Output failed: {0:#}")]
    Output(anyhow::Error),
}

/// What a finished run did
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub source: String,
    pub ingest: IngestReport,
    pub processed: usize,
    pub published: usize,
    pub skipped: usize,
    pub feed_size: usize,

    /// Where the rendered feed was stored; `None` if the run was cancelled
    pub location: Option<String>,
}

pub struct Runner<'a> {
    store: &'a ContentStore,
    oracle: &'a dyn CleanlinessOracle,
    renderer: &'a dyn Renderer,
    sink: &'a dyn ObjectSink,
    invalidator: Option<&'a dyn CacheInvalidator>,
    locks_dir: PathBuf,
    cancel: CancelFlag,
}

impl<'a> Runner<'a> {
    pub fn new(
        store: &'a ContentStore,
        oracle: &'a dyn CleanlinessOracle,
        renderer: &'a dyn Renderer,
        sink: &'a dyn ObjectSink,
        locks_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            oracle,
            renderer,
            sink,
            invalidator: None,
            locks_dir,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_invalidator(mut self, invalidator: &'a dyn CacheInvalidator) -> Self {
        self.invalidator = Some(invalidator);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    #[instrument(skip(self, config, source), fields(source = %config.name))]
    pub async fn run(&self, config: &SourceConfig, source: &dyn ContentSource) -> Result<RunSummary, RunError> {
        let run_id = Uuid::new_v4();
        info!(%run_id, "Starting run");

        let _lock = RunLock::try_acquire(&self.locks_dir, &config.name)?
            .ok_or_else(|| RunError::SourceLocked(config.name.clone()))?;

        let ingest = IngestionEngine::new(self.store).ingest(config, source).await?;

        let mut summary = RunSummary {
            run_id,
            source: config.name.clone(),
            ingest,
            processed: 0,
            published: 0,
            skipped: 0,
            feed_size: 0,
            location: None,
        };

        if self.cancel.is_cancelled() {
            warn!(%run_id, "Run cancelled after ingestion");
            return Ok(summary);
        }

        let publication = PublicationPipeline::new(self.store, self.oracle)
            .with_cancel(self.cancel.clone())
            .run(config, summary.ingest.is_new_source)?;

        summary.processed = publication.processed;
        summary.published = publication.feed_items.len();
        summary.skipped = publication.skipped;

        if publication.cancelled {
            warn!(%run_id, "Run cancelled during publication");
            return Ok(summary);
        }

        let feed = window::assemble(
            self.store,
            &config.name,
            &config.feed_type,
            publication.feed_items,
            config.limits.max_total,
        )?;
        summary.feed_size = feed.len();

        let document = self
            .renderer
            .render(&feed, &config.site)
            .map_err(RunError::Output)?;
        let name = format!("{}.{}", config.name, document.extension);
        let location = self
            .sink
            .store(&name, &document)
            .await
            .map_err(RunError::Output)?;

        if let Some(invalidator) = self.invalidator {
            invalidator.invalidate(&name).await.map_err(RunError::Output)?;
        }

        info!(%run_id, feed_size = summary.feed_size, location = %location, "Run complete");
        summary.location = Some(location);
        Ok(summary)
    }
}
