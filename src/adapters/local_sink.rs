//! Local directory object sink.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;

use super::{ObjectSink, RenderedDocument};

/// Writes documents as files under a root directory
pub struct LocalDirSink {
    root: PathBuf,
}

impl LocalDirSink {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl ObjectSink for LocalDirSink {
    async fn store(&self, name: &str, document: &RenderedDocument) -> Result<String> {
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create output directory: {}", self.root.display()))?;

        let path = self.root.join(name);
        fs::write(&path, &document.body)
            .await
            .with_context(|| format!("Failed to write feed: {}", path.display()))?;

        Ok(path.display().to_string())
    }
}
