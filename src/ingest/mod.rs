//! Upstream ingestion.
//!
//! Pages through a [`ContentSource`](crate::sources::ContentSource) and
//! reconciles every record against the content store:
//!
//! ```text
//! source pages → parse_record → content hash → find_by_key
//!                                                  ├─ absent    → insert (pending)
//!                                                  ├─ modified  → update (maybe reopen)
//!                                                  └─ unchanged → no-op
//! ```

pub mod engine;

pub use engine::{IngestError, IngestReport, IngestionEngine, Reconciled};
