//! Feed window assembly.

use std::cmp::Reverse;

use tracing::debug;

use crate::domain::{ContentHash, FeedItem};
use crate::store::{ContentStore, StoreError};

/// Combine this run's newly published items with previously published ones
/// into a feed of at most `max_total` entries.
pub fn assemble(
    store: &ContentStore,
    source: &str,
    feed_type: &str,
    newly_published: Vec<FeedItem>,
    max_total: usize,
) -> Result<Vec<FeedItem>, StoreError> {
    let exclude: Vec<ContentHash> = newly_published.iter().map(|i| i.content_hash.clone()).collect();

    let existing: Vec<FeedItem> = store
        .select_published(source, feed_type, max_total, &exclude)?
        .into_iter()
        .filter_map(FeedItem::from_published)
        .collect();

    debug!(new = newly_published.len(), existing = existing.len(), max_total, "Assembling feed window");

    Ok(merge_window(newly_published, existing, max_total))
}

/// New items first; once the window overflows, keep the `max_total` freshest
/// by publish date (undated last, ties in concatenation order).
pub fn merge_window(new: Vec<FeedItem>, existing: Vec<FeedItem>, max_total: usize) -> Vec<FeedItem> {
    let mut combined = new;
    combined.extend(existing);

    if combined.len() > max_total {
        // `Option` orders `None` first, so reversing puts undated items last
        combined.sort_by_key(|item| Reverse(item.published_at));
        combined.truncate(max_total);
    }

    combined
}
