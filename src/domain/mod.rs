//! Domain types for feedmill.
//!
//! - Item: ingested rows, identity hash, upstream metadata
//! - State: the pending/published/skipped lifecycle
//! - Feed: normalized bodies and output feed entries

pub mod feed;
pub mod item;
pub mod state;

// Re-export commonly used types
pub use feed::{FeedItem, NormalizedBody, ProcessedData, Slide};
pub use item::{ContentHash, ContentItem, ContentKind, ItemMetadata, ItemRevision, NewItem};
pub use state::{ItemState, ItemStatus, SkipReason, Transition, TransitionError};
