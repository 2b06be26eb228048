//! Command-line interface for feedmill.
//!
//! Provides commands for full runs, the individual ingest and publish
//! phases, per-source status and item inspection.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::adapters::{JsonRenderer, LocalDirSink, TermListOracle};
use crate::config::{Config, SourceConfig};
use crate::core::{CancelFlag, PublicationPipeline, RunLock, Runner};
use crate::domain::{ContentHash, ItemState};
use crate::ingest::IngestionEngine;
use crate::sources::{ContentSource, Platform, WordPressSource};
use crate::store::ContentStore;

/// feedmill - Content ingestion and feed publication engine
#[derive(Parser, Debug)]
#[command(name = "feedmill")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to .feedmill/config.yaml, then $FEEDMILL_HOME/config.yaml)
    #[arg(short, long, global = true, env = "FEEDMILL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest, publish and write the feed for a source
    Run {
        /// Source name from the config file
        #[arg(short, long)]
        source: String,
    },

    /// Only pull upstream records into the store
    Ingest {
        #[arg(short, long)]
        source: String,
    },

    /// Only decide pending items
    Publish {
        #[arg(short, long)]
        source: String,
    },

    /// Show item counts per status
    Status {
        /// Limit to one source (all sources if omitted)
        #[arg(short, long)]
        source: Option<String>,
    },

    /// Show a stored item
    Show {
        /// Content hash (64 hex characters)
        content_hash: String,

        #[arg(short, long)]
        source: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match self.command {
            Commands::Run { source } => run_source(&config, config.source(&source)?).await,
            Commands::Ingest { source } => ingest_source(&config, config.source(&source)?).await,
            Commands::Publish { source } => publish_source(&config, config.source(&source)?),
            Commands::Status { source } => show_status(&config, source.as_deref()),
            Commands::Show { content_hash, source } => show_item(&config, &content_hash, &source),
            Commands::Config => show_config(&config),
        }
    }
}

fn open_store(config: &Config) -> Result<ContentStore> {
    if let Some(parent) = config.database.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory: {}", parent.display()))?;
    }
    ContentStore::open(&config.database)
        .with_context(|| format!("Failed to open database: {}", config.database.display()))
}

fn load_oracle(config: &Config) -> Result<TermListOracle> {
    match &config.terms_file {
        Some(path) => TermListOracle::from_file(path),
        None => {
            warn!("No terms_file configured, every item will pass the cleanliness check");
            Ok(TermListOracle::default())
        }
    }
}

fn build_source(source: &SourceConfig) -> Box<dyn ContentSource> {
    match source.platform {
        Platform::WordPress => Box::new(WordPressSource::from_config(source)),
    }
}

fn lock_source(config: &Config, source: &SourceConfig) -> Result<RunLock> {
    RunLock::try_acquire(&config.locks_dir(), &source.name)?
        .with_context(|| format!("Source '{}' is already being processed by another run", source.name))
}

/// Cancel flag tripped by Ctrl-C
fn cancel_on_ctrl_c() -> CancelFlag {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current item");
            flag.cancel();
        }
    });
    cancel
}

async fn run_source(config: &Config, source: &SourceConfig) -> Result<()> {
    let store = open_store(config)?;
    let oracle = load_oracle(config)?;
    let renderer = JsonRenderer;
    let sink = LocalDirSink::new(config.output_dir.clone());
    let upstream = build_source(source);

    let runner = Runner::new(&store, &oracle, &renderer, &sink, config.locks_dir())
        .with_cancel(cancel_on_ctrl_c());
    let summary = runner.run(source, upstream.as_ref()).await?;

    eprintln!("\n[Run {} for '{}']", summary.run_id, summary.source);
    eprintln!(
        "  Ingested:  {} seen, {} new, {} updated, {} failed",
        summary.ingest.total_seen, summary.ingest.total_new, summary.ingest.total_updated, summary.ingest.total_failed
    );
    eprintln!(
        "  Decided:   {} ({} published, {} skipped)",
        summary.processed, summary.published, summary.skipped
    );
    match &summary.location {
        Some(location) => eprintln!("  Feed:      {} items -> {}", summary.feed_size, location),
        None => eprintln!("  Feed:      not written (cancelled)"),
    }

    Ok(())
}

async fn ingest_source(config: &Config, source: &SourceConfig) -> Result<()> {
    let _lock = lock_source(config, source)?;
    let store = open_store(config)?;
    let upstream = build_source(source);

    let report = IngestionEngine::new(&store).ingest(source, upstream.as_ref()).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn publish_source(config: &Config, source: &SourceConfig) -> Result<()> {
    let _lock = lock_source(config, source)?;
    let store = open_store(config)?;
    let oracle = load_oracle(config)?;

    // Without a preceding ingest, a source still counts as new until its
    // first item has been decided
    let counts = store.status_counts(&source.name, &source.feed_type)?;
    let is_new_source = counts.published + counts.skipped == 0;
    info!(is_new_source, pending = counts.pending, "Publishing pending items");

    let report = PublicationPipeline::new(&store, &oracle)
        .with_cancel(cancel_on_ctrl_c())
        .run(source, is_new_source)?;

    println!("Processed: {}", report.processed);
    println!("Published: {}", report.feed_items.len());
    println!("Skipped:   {}", report.skipped);
    for item in &report.feed_items {
        println!("  {}  {}", item.content_hash, item.data.title);
    }
    Ok(())
}

fn show_status(config: &Config, only: Option<&str>) -> Result<()> {
    let store = open_store(config)?;

    let sources: Vec<&SourceConfig> = match only {
        Some(name) => vec![config.source(name)?],
        None => config.sources.iter().collect(),
    };

    println!(
        "{:<24} {:<14} {:>9} {:>10} {:>8} {:>8}",
        "SOURCE", "FEED TYPE", "PENDING", "PUBLISHED", "SKIPPED", "TOTAL"
    );
    println!("{}", "-".repeat(78));

    for source in sources {
        let counts = store.status_counts(&source.name, &source.feed_type)?;
        println!(
            "{:<24} {:<14} {:>9} {:>10} {:>8} {:>8}",
            source.name,
            source.feed_type,
            counts.pending,
            counts.published,
            counts.skipped,
            counts.total()
        );
    }

    Ok(())
}

fn show_item(config: &Config, content_hash: &str, source: &str) -> Result<()> {
    let store = open_store(config)?;
    let hash = ContentHash::from_hex(content_hash.to_lowercase());

    let item = store
        .find_by_key(&hash, source)?
        .with_context(|| format!("No item {} in source '{}'", content_hash, source))?;

    println!("Hash:      {}", item.content_hash);
    println!("Source:    {} ({}, {})", item.source, item.platform, item.feed_type);
    println!("Title:     {}", item.metadata.title);
    if let Some(link) = &item.metadata.link {
        println!("Link:      {}", link);
    }
    println!("Status:    {}", item.state.status());
    println!("Ingested:  {}", item.ingested_at);
    if let Some(published) = item.item_published_at {
        println!("Upstream published: {}", published);
    }
    if let Some(modified) = item.item_modified_at {
        println!("Upstream modified:  {}", modified);
    }

    match &item.state {
        ItemState::Pending => {}
        ItemState::Published { published_at, processed } => {
            println!("Published: {}", published_at);
            println!("\n{}", serde_json::to_string_pretty(processed)?);
        }
        ItemState::Skipped { skipped_at, reason } => {
            println!("Skipped:   {} ({})", skipped_at, reason);
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    println!("feedmill configuration");
    println!();
    println!(
        "Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:       {}", config.home.display());
    println!("  Database:   {}", config.database.display());
    println!("  Output:     {}", config.output_dir.display());
    println!("  Locks:      {}", config.locks_dir().display());
    println!(
        "  Terms file: {}",
        config
            .terms_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!();
    println!("Sources:");
    for source in &config.sources {
        println!(
            "  {:<20} {:<10} {:<12} {}",
            source.name,
            source.platform.as_str(),
            source.feed_type,
            source.url
        );
        println!(
            "  {:<20} kind={} per_page={} heading=h{} limits={}/{}/{}",
            "",
            source.content_kind,
            source.per_page,
            source.heading_level,
            source.limits.per_run_limit,
            source.limits.onboarding_limit,
            source.limits.max_total
        );
    }

    Ok(())
}
