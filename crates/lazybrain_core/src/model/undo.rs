//! Undo log entries.
//!
//! # Responsibility
//! - Model the pre-mutation snapshot captured before every mutating
//!   lifecycle operation.
//!
//! # Invariants
//! - A snapshot is written before the mutation it guards, in the same
//!   transaction.
//! - An entry is consumed by exactly one undo invocation.

use crate::model::item::{CapturedItem, UserId};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The mutating action an undo entry can revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndoAction {
    Complete,
    Delete,
    PriorityChange,
    DateChange,
    StatusChange,
    Move,
}

impl UndoAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Delete => "delete",
            Self::PriorityChange => "priority_change",
            Self::DateChange => "date_change",
            Self::StatusChange => "status_change",
            Self::Move => "move",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "complete" => Some(Self::Complete),
            "delete" => Some(Self::Delete),
            "priority_change" => Some(Self::PriorityChange),
            "date_change" => Some(Self::DateChange),
            "status_change" => Some(Self::StatusChange),
            "move" => Some(Self::Move),
            _ => None,
        }
    }
}

impl Display for UndoAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One snapshot in the per-user undo ring.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoEntry {
    /// Insertion-ordered sequence number (storage rowid).
    pub seq: i64,
    pub user_id: UserId,
    pub action: UndoAction,
    /// Full prior state of the mutated item.
    pub snapshot: CapturedItem,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}
