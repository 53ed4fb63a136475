//! Per-user settings storage.
//!
//! # Responsibility
//! - Key/value settings with a shared-default row under user id 0.
//!
//! # Invariants
//! - Lookup order is per-user first, then the shared default.

use crate::model::item::UserId;
use crate::repo::item_repo::RepoResult;
use rusqlite::{params, Connection, OptionalExtension};

/// Reserved user id holding shared default settings.
pub const SHARED_USER_ID: UserId = 0;

pub fn get(conn: &Connection, user_id: UserId, key: &str) -> RepoResult<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM settings WHERE user_id = ?1 AND key = ?2;",
            params![user_id, key],
            |row| row.get::<_, String>(0),
        )
        .optional()?;

    if value.is_some() || user_id == SHARED_USER_ID {
        return Ok(value);
    }

    let fallback = conn
        .query_row(
            "SELECT value FROM settings WHERE user_id = ?1 AND key = ?2;",
            params![SHARED_USER_ID, key],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(fallback)
}

pub fn set(conn: &Connection, user_id: UserId, key: &str, value: &str) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO settings (user_id, key, value) VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id, key) DO UPDATE SET value = excluded.value;",
        params![user_id, key, value],
    )?;
    Ok(())
}
