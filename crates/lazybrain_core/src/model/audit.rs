//! Inbox audit record.
//!
//! # Responsibility
//! - Model the immutable log entry written for every inbound message.
//!
//! # Invariants
//! - Created before any routing decision is made.
//! - Transitions from unprocessed to processed at most once.

use crate::model::item::{ItemId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for an audit record.
pub type AuditId = Uuid;

/// One inbound message with its classification outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditId,
    pub user_id: UserId,
    /// Verbatim inbound text, never lost even when routing fails.
    pub raw_message: String,
    /// Transport tag, e.g. `telegram`, `shortcut`, `cli`.
    pub source: String,
    /// Classified bucket label, or `needs_review`.
    pub category: String,
    /// Classifier confidence in `[0, 1]`; 1.0 for forced prefixes.
    pub confidence: f64,
    /// Classifier-generated title.
    pub title: String,
    /// Raw classifier payload, kept for reclassification.
    pub response_json: serde_json::Value,
    /// True once the message has been routed to an item.
    pub processed: bool,
    /// Back-reference to the created item when routed.
    pub target_id: Option<ItemId>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl AuditRecord {
    /// Creates an unprocessed audit record for an inbound message.
    pub fn new(
        user_id: UserId,
        raw_message: impl Into<String>,
        source: impl Into<String>,
        category: impl Into<String>,
        confidence: f64,
        title: impl Into<String>,
        response_json: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            raw_message: raw_message.into(),
            source: source.into(),
            category: category.into(),
            confidence,
            title: title.into(),
            response_json,
            processed: false,
            target_id: None,
            created_at: crate::model::item::now_epoch_ms(),
        }
    }
}
