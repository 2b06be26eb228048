//! feedmill - Content ingestion and feed publication engine
//!
//! Pulls articles from upstream publishing platforms, keeps one durable row
//! per item, decides each pending item once (published or skipped) and
//! serves a bounded, freshness-ordered feed of the published ones.
//!
//! # Architecture
//!
//! A run handles exactly one source, in two strictly sequential phases:
//! - Ingestion reconciles every upstream record with its stored row
//! - Publication normalizes pending rows, asks the cleanliness oracle and
//!   records the decision; the feed window is then rendered and stored
//!
//! # Modules
//!
//! - `sources`: Upstream platforms (WordPress REST)
//! - `store`: SQLite content store and row lifecycle
//! - `ingest`: Paginated ingestion and reconciliation
//! - `segment`: HTML slideshow segmentation
//! - `core`: Publication, feed window, runner and run lock
//! - `adapters`: Oracle, renderer, sink and cache invalidator seams
//! - `domain`: Item, state machine and feed types
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Full run for one source
//! feedmill run --source acme-slides
//!
//! # Per-status counts
//! feedmill status
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;
pub mod segment;
pub mod sources;
pub mod store;

// Re-export commonly used types
pub use config::{Config, ConfigError, RunLimits, SiteMetadata, SourceConfig};
pub use core::{CancelFlag, PublicationPipeline, PublicationReport, RunError, RunSummary, Runner};
pub use domain::{ContentHash, ContentItem, ContentKind, FeedItem, ItemState, ItemStatus, SkipReason};
pub use ingest::{IngestReport, IngestionEngine};
pub use segment::Segmenter;
pub use sources::{ContentSource, Platform, SourceError, WordPressSource};
pub use store::{ContentStore, StoreError};
