//! Forbidden-term list oracle.
//!
//! Terms match whole words (or whole word sequences) case-insensitively, so
//! "ass" does not reject "class".

use std::path::Path;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, BuildError};
use anyhow::{Context, Result};
use tracing::info;

use super::CleanlinessOracle;

/// Oracle backed by a fixed term list
#[derive(Debug, Clone, Default)]
pub struct TermListOracle {
    /// Automaton over the normalized terms; `None` for an empty list
    matcher: Option<AhoCorasick>,
    len: usize,
}

impl TermListOracle {
    pub fn new<I, S>(terms: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms: Vec<String> = terms
            .into_iter()
            .map(|t| normalize(t.as_ref()))
            .filter(|t| !t.is_empty())
            .collect();

        if terms.is_empty() {
            return Ok(Self::default());
        }

        let matcher = AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .build(&terms)?;

        Ok(Self {
            matcher: Some(matcher),
            len: terms.len(),
        })
    }

    /// Load terms from a file, one per line; blank lines and `#` comments are ignored
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read term list: {}", path.display()))?;

        let oracle = Self::new(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
        .with_context(|| format!("Failed to build term matcher: {}", path.display()))?;
        info!(terms = oracle.len(), path = %path.display(), "Loaded term list");
        Ok(oracle)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Lowercase and reduce to alphanumeric words joined by single spaces
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// True when `text[start..end]` is not glued to a neighbouring word
fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    before.map_or(true, |c| !c.is_alphanumeric()) && after.map_or(true, |c| !c.is_alphanumeric())
}

impl CleanlinessOracle for TermListOracle {
    fn is_clean(&self, candidate: &str) -> bool {
        let Some(matcher) = &self.matcher else {
            return true;
        };
        let text = normalize(candidate);
        // Overlapping, so every hit gets its own boundary check
        !matcher
            .find_overlapping_iter(&text)
            .any(|m| is_whole_word(&text, m.start(), m.end()))
    }
}
