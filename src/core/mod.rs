//! Core run logic.
//!
//! This module contains:
//! - PublicationPipeline: decides pending rows
//! - Window: assembles the bounded output feed
//! - Runner: one end-to-end run per source
//! - RunLock: keeps two runs off the same source

pub mod lock;
pub mod publish;
pub mod runner;
pub mod window;

pub use lock::RunLock;
pub use publish::{processing_limit, CancelFlag, PublicationPipeline, PublicationReport};
pub use runner::{RunError, RunSummary, Runner};
pub use window::{assemble, merge_window};
