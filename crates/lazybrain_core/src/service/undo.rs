//! Undo service: revert the most recent mutation.
//!
//! # Responsibility
//! - Pop the newest undo entry and restore its snapshot.
//!
//! # Invariants
//! - Pop and revert run in one transaction; a failed revert leaves the
//!   entry in the log.
//! - A deleted item is reinserted under its original id, so links and
//!   audit back-references survive the round trip.

use crate::model::item::UserId;
use crate::model::undo::UndoAction;
use crate::repo::item_repo::{ItemRepository, RepoError, RepoResult, SqliteItemRepository};
use crate::repo::undo_repo;
use log::info;
use rusqlite::Connection;

/// Result of an undo request.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoOutcome {
    /// The snapshot was restored.
    Reverted { action: UndoAction, title: String },
    /// Nothing left to undo for this user.
    Empty,
}

/// Reverts the user's most recent mutation, if any.
pub fn undo_last(conn: &mut Connection, user_id: UserId) -> RepoResult<UndoOutcome> {
    let tx = conn.transaction().map_err(RepoError::from)?;

    let Some(entry) = undo_repo::pop_latest(&tx, user_id)? else {
        return Ok(UndoOutcome::Empty);
    };

    let repo = SqliteItemRepository::new(&tx);
    match entry.action {
        // The row is gone; reinsert the snapshot as-is.
        UndoAction::Delete => {
            repo.create_item(&entry.snapshot)?;
        }
        // The row still exists; restore every mutable field.
        _ => {
            repo.update_item(user_id, &entry.snapshot)?;
        }
    }

    tx.commit().map_err(RepoError::from)?;
    info!(
        "event=undo_applied module=undo action={} item_id={}",
        entry.action.as_str(),
        entry.snapshot.id
    );
    Ok(UndoOutcome::Reverted {
        action: entry.action,
        title: entry.snapshot.title,
    })
}
