//! Item lifecycle state machine.
//!
//! An item starts `Pending` and is decided exactly once per ingestion cycle,
//! either `Published` (with its normalized form) or `Skipped` (with a reason).
//! Only a reconciliation reset in the ingestion phase moves a decided item
//! back to `Pending`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::feed::ProcessedData;

/// Flat status tag, as persisted in the `status` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Published,
    Skipped,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Published => "published",
            ItemStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ItemStatus::Pending),
            "published" => Ok(ItemStatus::Published),
            "skipped" => Ok(ItemStatus::Skipped),
            other => Err(TransitionError::UnknownStatus(other.to_string())),
        }
    }
}

/// Why an item was not published
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The cleanliness oracle rejected the item
    Profanity,

    /// Normalizing or evaluating the item failed
    Error(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Profanity => f.write_str("profanity"),
            SkipReason::Error(message) => write!(f, "error: {}", message),
        }
    }
}

impl FromStr for SkipReason {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "profanity" {
            return Ok(SkipReason::Profanity);
        }
        let message = s.strip_prefix("error: ").unwrap_or(s);
        Ok(SkipReason::Error(message.to_string()))
    }
}

/// A decision requested by the publication pipeline
#[derive(Debug, Clone)]
pub enum Transition {
    Publish(ProcessedData),
    Skip(SkipReason),
}

/// Errors raised by illegal or unparseable state changes
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Invalid state transition: {from} → {to}")]
    NotPending { from: ItemStatus, to: ItemStatus },

    #[error("Unknown item status: {0}")]
    UnknownStatus(String),

    #[error("Inconsistent {status} row: {detail}")]
    Inconsistent { status: ItemStatus, detail: String },
}

/// Current lifecycle state of an item, with the data each state owns
#[derive(Debug, Clone, PartialEq)]
pub enum ItemState {
    Pending,
    Published {
        published_at: DateTime<Utc>,
        processed: ProcessedData,
    },
    Skipped {
        skipped_at: DateTime<Utc>,
        reason: SkipReason,
    },
}

impl ItemState {
    pub fn status(&self) -> ItemStatus {
        match self {
            ItemState::Pending => ItemStatus::Pending,
            ItemState::Published { .. } => ItemStatus::Published,
            ItemState::Skipped { .. } => ItemStatus::Skipped,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ItemState::Pending)
    }

    /// Apply a publication decision. Only pending items can be decided.
    pub fn apply(&self, transition: Transition, at: DateTime<Utc>) -> Result<ItemState, TransitionError> {
        let target = match &transition {
            Transition::Publish(_) => ItemStatus::Published,
            Transition::Skip(_) => ItemStatus::Skipped,
        };

        if !self.is_pending() {
            return Err(TransitionError::NotPending {
                from: self.status(),
                to: target,
            });
        }

        Ok(match transition {
            Transition::Publish(processed) => ItemState::Published {
                published_at: at,
                processed,
            },
            Transition::Skip(reason) => ItemState::Skipped {
                skipped_at: at,
                reason,
            },
        })
    }

    /// Rebuild a state from its persisted columns, rejecting rows that
    /// break the per-status invariants.
    pub fn from_columns(
        status: ItemStatus,
        published_at: Option<DateTime<Utc>>,
        skipped_at: Option<DateTime<Utc>>,
        skip_reason: Option<String>,
        processed: Option<ProcessedData>,
    ) -> Result<ItemState, TransitionError> {
        let inconsistent = |detail: &str| TransitionError::Inconsistent {
            status,
            detail: detail.to_string(),
        };

        match status {
            ItemStatus::Pending => {
                if published_at.is_some() || skipped_at.is_some() || skip_reason.is_some() || processed.is_some() {
                    return Err(inconsistent("pending row carries decision data"));
                }
                Ok(ItemState::Pending)
            }
            ItemStatus::Published => match (published_at, processed) {
                (Some(published_at), Some(processed)) => Ok(ItemState::Published {
                    published_at,
                    processed,
                }),
                _ => Err(inconsistent("missing published_at or processed_data")),
            },
            ItemStatus::Skipped => match (skipped_at, skip_reason) {
                (Some(skipped_at), Some(reason)) => Ok(ItemState::Skipped {
                    skipped_at,
                    reason: reason.parse().unwrap_or_else(|never| match never {}),
                }),
                _ => Err(inconsistent("missing skipped_at or skip_reason")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NormalizedBody;

    fn processed() -> ProcessedData {
        ProcessedData {
            title: "Title".to_string(),
            description: None,
            link: None,
            author: None,
            image: None,
            body: NormalizedBody::article("<p>x</p>"),
        }
    }

    #[test]
    fn test_pending_can_be_published() {
        let now = Utc::now();
        let state = ItemState::Pending
            .apply(Transition::Publish(processed()), now)
            .unwrap();

        assert_eq!(state.status(), ItemStatus::Published);
        match state {
            ItemState::Published { published_at, .. } => assert_eq!(published_at, now),
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_decided_items_reject_transitions() {
        let now = Utc::now();
        let skipped = ItemState::Pending
            .apply(Transition::Skip(SkipReason::Profanity), now)
            .unwrap();

        let err = skipped
            .apply(Transition::Publish(processed()), now)
            .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::NotPending {
                from: ItemStatus::Skipped,
                to: ItemStatus::Published
            }
        ));
    }

    #[test]
    fn test_skip_reason_text() {
        assert_eq!(SkipReason::Profanity.to_string(), "profanity");
        assert_eq!(
            SkipReason::Error("boom".to_string()).to_string(),
            "error: boom"
        );
        assert_eq!("profanity".parse::<SkipReason>().unwrap(), SkipReason::Profanity);
        assert_eq!(
            "error: boom".parse::<SkipReason>().unwrap(),
            SkipReason::Error("boom".to_string())
        );
    }

    #[test]
    fn test_from_columns_rejects_broken_rows() {
        let now = Utc::now();

        assert!(ItemState::from_columns(ItemStatus::Published, Some(now), None, None, None).is_err());
        assert!(ItemState::from_columns(ItemStatus::Skipped, None, Some(now), None, None).is_err());
        assert!(ItemState::from_columns(ItemStatus::Pending, Some(now), None, None, None).is_err());

        let skipped = ItemState::from_columns(
            ItemStatus::Skipped,
            None,
            Some(now),
            Some("profanity".to_string()),
            None,
        )
        .unwrap();
        assert_eq!(
            skipped,
            ItemState::Skipped {
                skipped_at: now,
                reason: SkipReason::Profanity
            }
        );
    }
}
