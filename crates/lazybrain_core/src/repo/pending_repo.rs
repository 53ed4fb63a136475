//! Pending delete confirmation slot.
//!
//! # Responsibility
//! - Hold at most one delete awaiting confirmation per user.
//!
//! # Invariants
//! - A new request overwrites any prior slot for the same user.
//! - `take_if_fresh` checks and clears the slot in one statement, so
//!   concurrent confirmations resolve to exactly one winner; a stale
//!   slot is consumed silently so an expired confirmation is a no-op.

use crate::model::item::{ItemId, UserId};
use crate::repo::item_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// A delete request parked until the user confirms it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDelete {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub title: String,
    /// Unix epoch milliseconds at request time.
    pub requested_at: i64,
}

pub fn set_slot(
    conn: &Connection,
    user_id: UserId,
    item_id: ItemId,
    title: &str,
    requested_at: i64,
) -> RepoResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO pending_deletes (user_id, item_id, title, requested_at)
         VALUES (?1, ?2, ?3, ?4);",
        params![user_id, item_id.to_string(), title, requested_at],
    )?;
    Ok(())
}

/// Consumes the slot, returning it only when still within the TTL.
pub fn take_if_fresh(
    conn: &Connection,
    user_id: UserId,
    ttl_ms: i64,
    now_ms: i64,
) -> RepoResult<Option<PendingDelete>> {
    // Single statement so two racing confirmations cannot both win.
    let row = conn
        .query_row(
            "DELETE FROM pending_deletes WHERE user_id = ?1
             RETURNING item_id, title, requested_at;",
            params![user_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .optional()?;

    let Some((raw_id, title, requested_at)) = row else {
        return Ok(None);
    };
    if now_ms - requested_at > ttl_ms {
        return Ok(None);
    }

    let item_id = Uuid::parse_str(&raw_id).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid `{raw_id}` in pending_deletes.item_id"))
    })?;

    Ok(Some(PendingDelete {
        user_id,
        item_id,
        title,
        requested_at,
    }))
}

pub fn clear(conn: &Connection, user_id: UserId) -> RepoResult<()> {
    conn.execute(
        "DELETE FROM pending_deletes WHERE user_id = ?1;",
        params![user_id],
    )?;
    Ok(())
}
