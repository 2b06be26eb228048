//! Configuration for feedmill.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (FEEDMILL_HOME, FEEDMILL_DATABASE)
//! 2. Config file (explicit path, else .feedmill/config.yaml in the current
//!    directory or a parent, else $FEEDMILL_HOME/config.yaml)
//! 3. Defaults (~/.feedmill)
//!
//! The resolved `Config` is a plain value: load it once in `main` and pass it
//! (or the relevant `SourceConfig`) to each component.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ContentKind;
use crate::sources::Platform;

/// Configuration errors detected before any work starts
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No sources configured")]
    NoSources,

    #[error("Source #{index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("Duplicate source name: {0}")]
    DuplicateSource(String),

    #[error("Source '{source_name}': {message}")]
    Invalid { source_name: String, message: String },

    #[error("Unknown source: {0}")]
    UnknownSource(String),
}

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,

    /// Database path (relative to home)
    #[serde(default)]
    pub database: Option<String>,

    /// Forbidden-term list, one term per line (relative to home)
    #[serde(default)]
    pub terms_file: Option<String>,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Directory rendered feeds are written to (relative to home)
    pub directory: Option<String>,
}

/// One logical feed: an upstream site plus its filters and limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub name: String,

    pub platform: Platform,

    #[serde(default)]
    pub feed_type: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub content_kind: ContentKind,

    #[serde(default = "default_per_page")]
    pub per_page: u32,

    #[serde(default)]
    pub categories: Vec<u64>,

    #[serde(default)]
    pub tags: Vec<u64>,

    /// Heading level that titles each slide (2 = `<h2>`)
    #[serde(default = "default_heading_level")]
    pub heading_level: u8,

    #[serde(default)]
    pub site: SiteMetadata,

    #[serde(default)]
    pub limits: RunLimits,
}

/// Site-level data handed to the renderer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteMetadata {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub link: String,

    #[serde(default)]
    pub description: String,
}

/// Per-run processing and feed size limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLimits {
    /// Pending items decided per run once a source is established
    #[serde(default = "default_per_run_limit")]
    pub per_run_limit: usize,

    /// Pending items decided on the first run of a new source
    #[serde(default = "default_onboarding_limit")]
    pub onboarding_limit: usize,

    /// Maximum number of entries in the output feed
    #[serde(default = "default_max_total")]
    pub max_total: usize,
}

fn default_per_page() -> u32 {
    20
}
fn default_heading_level() -> u8 {
    2
}
fn default_per_run_limit() -> usize {
    50
}
fn default_onboarding_limit() -> usize {
    20
}
fn default_max_total() -> usize {
    100
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            per_run_limit: default_per_run_limit(),
            onboarding_limit: default_onboarding_limit(),
            max_total: default_max_total(),
        }
    }
}

impl SourceConfig {
    /// Minimal source definition; everything else takes its default
    pub fn new(
        name: impl Into<String>,
        platform: Platform,
        feed_type: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            platform,
            feed_type: feed_type.into(),
            url: url.into(),
            content_kind: ContentKind::default(),
            per_page: default_per_page(),
            categories: Vec::new(),
            tags: Vec::new(),
            heading_level: default_heading_level(),
            site: SiteMetadata::default(),
            limits: RunLimits::default(),
        }
    }

    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        let required = [
            ("name", &self.name),
            ("feed_type", &self.feed_type),
            ("url", &self.url),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField { index, field });
            }
        }

        let invalid = |message: &str| ConfigError::Invalid {
            source_name: self.name.clone(),
            message: message.to_string(),
        };

        // Names become lock and output file names
        if self.name.contains(['/', '\\']) || self.name == "." || self.name == ".." {
            return Err(invalid("name must not contain path separators"));
        }
        if !(1..=100).contains(&self.per_page) {
            return Err(invalid("per_page must be between 1 and 100"));
        }
        if !(1..=6).contains(&self.heading_level) {
            return Err(invalid("heading_level must be between 1 and 6"));
        }
        if self.limits.per_run_limit == 0 || self.limits.onboarding_limit == 0 || self.limits.max_total == 0 {
            return Err(invalid("limits must be greater than zero"));
        }

        Ok(())
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct Config {
    /// Engine state directory
    pub home: PathBuf,
    /// SQLite database path
    pub database: PathBuf,
    /// Forbidden-term list (if configured)
    pub terms_file: Option<PathBuf>,
    /// Rendered feed output directory
    pub output_dir: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load configuration from all sources and validate it
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = load_config(explicit)?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields. Runs before any ingestion or publication.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        let mut seen = HashSet::new();
        for (index, source) in self.sources.iter().enumerate() {
            source.validate(index)?;
            if !seen.insert(source.name.as_str()) {
                return Err(ConfigError::DuplicateSource(source.name.clone()));
            }
        }

        Ok(())
    }

    /// Look up a source by name
    pub fn source(&self, name: &str) -> Result<&SourceConfig, ConfigError> {
        self.sources
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ConfigError::UnknownSource(name.to_string()))
    }

    /// Directory holding per-source run locks
    pub fn locks_dir(&self) -> PathBuf {
        self.home.join("locks")
    }
}

/// Default home directory (~/.feedmill or $FEEDMILL_HOME)
fn default_home() -> Result<PathBuf> {
    if let Ok(env_home) = std::env::var("FEEDMILL_HOME") {
        return Ok(PathBuf::from(env_home));
    }
    Ok(dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".feedmill"))
}

/// Find config file by searching current directory and parents
fn find_config_file(home: &Path) -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".feedmill").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    let home_config = home.join("config.yaml");
    home_config.exists().then_some(home_config)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to a base directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Merge a parsed config file with the environment
fn resolve(home: PathBuf, file: ConfigFile, config_file: Option<PathBuf>) -> Config {
    let database = match std::env::var("FEEDMILL_DATABASE") {
        Ok(env_db) => PathBuf::from(env_db),
        Err(_) => resolve_path(&home, file.database.as_deref().unwrap_or("feedmill.db")),
    };

    let terms_file = file.terms_file.as_deref().map(|p| resolve_path(&home, p));
    let output_dir = resolve_path(&home, file.output.directory.as_deref().unwrap_or("out"));

    Config {
        home,
        database,
        terms_file,
        output_dir,
        config_file,
        sources: file.sources,
    }
}

fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let home = default_home()?;

    let config_path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(&home),
    };

    let file = match config_path {
        Some(ref path) => load_config_file(path)?,
        None => anyhow::bail!(
            "No config file found. Create .feedmill/config.yaml or {}",
            home.join("config.yaml").display()
        ),
    };

    Ok(resolve(home, file, config_path))
}
