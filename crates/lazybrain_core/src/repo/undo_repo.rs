//! Undo log persistence.
//!
//! # Responsibility
//! - Record pre-mutation item snapshots, newest last.
//! - Bound the per-user history to a fixed capacity.
//!
//! # Invariants
//! - `push` evicts the oldest entries beyond the capacity in the same
//!   statement batch, so the log never exceeds the cap.
//! - `pop_latest` both reads and deletes; callers run it inside the
//!   same transaction as the revert so a crash cannot drop an entry
//!   without applying it.

use crate::model::item::{CapturedItem, UserId};
use crate::model::undo::{UndoAction, UndoEntry};
use crate::repo::item_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Appends a snapshot and trims the user's log to `capacity` entries.
pub fn push(
    conn: &Connection,
    user_id: UserId,
    action: UndoAction,
    snapshot: &CapturedItem,
    capacity: usize,
) -> RepoResult<()> {
    let payload = serde_json::to_string(snapshot)
        .map_err(|err| RepoError::InvalidData(format!("unserializable snapshot: {err}")))?;

    conn.execute(
        "INSERT INTO undo_log (user_id, action, snapshot, created_at)
         VALUES (?1, ?2, ?3, ?4);",
        params![
            user_id,
            action.as_str(),
            payload,
            crate::model::item::now_epoch_ms()
        ],
    )?;

    conn.execute(
        "DELETE FROM undo_log
         WHERE user_id = ?1 AND seq NOT IN (
            SELECT seq FROM undo_log
            WHERE user_id = ?1
            ORDER BY seq DESC
            LIMIT ?2
         );",
        params![user_id, capacity as i64],
    )?;

    Ok(())
}

/// Removes and returns the newest entry for the user, if any.
pub fn pop_latest(conn: &Connection, user_id: UserId) -> RepoResult<Option<UndoEntry>> {
    let row = conn
        .query_row(
            "SELECT seq, action, snapshot, created_at
             FROM undo_log
             WHERE user_id = ?1
             ORDER BY seq DESC
             LIMIT 1;",
            params![user_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )
        .optional()?;

    let Some((seq, action_text, payload, created_at)) = row else {
        return Ok(None);
    };

    let action = UndoAction::parse(&action_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid action `{action_text}` in undo_log.action"))
    })?;
    let snapshot: CapturedItem = serde_json::from_str(&payload)
        .map_err(|err| RepoError::InvalidData(format!("invalid snapshot payload: {err}")))?;

    conn.execute("DELETE FROM undo_log WHERE seq = ?1;", params![seq])?;

    Ok(Some(UndoEntry {
        seq,
        user_id,
        action,
        snapshot,
        created_at,
    }))
}

pub fn count(conn: &Connection, user_id: UserId) -> RepoResult<u32> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM undo_log WHERE user_id = ?1;",
        params![user_id],
        |row| row.get::<_, u32>(0),
    )?;
    Ok(count)
}
