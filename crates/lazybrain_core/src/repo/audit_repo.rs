//! Inbox audit log persistence.
//!
//! # Responsibility
//! - Insert one audit record per inbound message before routing.
//! - Flip records from pending to processed exactly once.
//!
//! # Invariants
//! - `mark_processed` is a one-shot guard: a second call for the same
//!   record fails with `AlreadyProcessed` instead of silently
//!   rewriting routing targets.
//! - `update_routing` bypasses the guard and is reserved for explicit
//!   reclassification by the owning user.

use crate::model::audit::{AuditId, AuditRecord};
use crate::model::item::{ItemId, UserId};
use crate::repo::item_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const AUDIT_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    raw_message,
    source,
    category,
    confidence,
    title,
    response_json,
    processed,
    target_id,
    created_at
FROM inbox_log";

pub fn insert(conn: &Connection, record: &AuditRecord) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO inbox_log (
            id, user_id, raw_message, source, category, confidence,
            title, response_json, processed, target_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
        params![
            record.id.to_string(),
            record.user_id,
            record.raw_message.as_str(),
            record.source.as_str(),
            record.category.as_str(),
            record.confidence,
            record.title.as_str(),
            record.response_json.to_string(),
            record.processed as i64,
            record.target_id.map(|id| id.to_string()),
            record.created_at,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, user_id: UserId, id: AuditId) -> RepoResult<AuditRecord> {
    let mut stmt = conn.prepare(&format!("{AUDIT_SELECT_SQL} WHERE id = ?1;"))?;
    let record = stmt
        .query_row(params![id.to_string()], |row| Ok(parse_audit_row(row)))
        .optional()?
        .transpose()?
        .ok_or(RepoError::AuditNotFound(id))?;

    if record.user_id != user_id {
        return Err(RepoError::AuditNotFound(id));
    }
    Ok(record)
}

/// Marks a pending record as routed. Fails when the record is missing
/// or already processed.
pub fn mark_processed(
    conn: &Connection,
    id: AuditId,
    category: &str,
    target_id: Option<ItemId>,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE inbox_log
         SET processed = 1, category = ?1, target_id = ?2
         WHERE id = ?3 AND processed = 0;",
        params![category, target_id.map(|t| t.to_string()), id.to_string()],
    )?;

    if changed == 1 {
        return Ok(());
    }

    let exists = conn
        .query_row(
            "SELECT 1 FROM inbox_log WHERE id = ?1;",
            [id.to_string()],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    if exists {
        Err(RepoError::AlreadyProcessed(id))
    } else {
        Err(RepoError::AuditNotFound(id))
    }
}

/// Rewrites category and routing target after a manual reclassify.
pub fn update_routing(
    conn: &Connection,
    id: AuditId,
    category: &str,
    target_id: Option<ItemId>,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE inbox_log
         SET processed = 1, category = ?1, target_id = ?2
         WHERE id = ?3;",
        params![category, target_id.map(|t| t.to_string()), id.to_string()],
    )?;
    if changed == 0 {
        return Err(RepoError::AuditNotFound(id));
    }
    Ok(())
}

/// Oldest unprocessed record for the review queue.
pub fn first_needs_review(conn: &Connection, user_id: UserId) -> RepoResult<Option<AuditRecord>> {
    let mut stmt = conn.prepare(&format!(
        "{AUDIT_SELECT_SQL}
         WHERE user_id = ?1 AND processed = 0
         ORDER BY created_at ASC LIMIT 1;"
    ))?;
    let row = stmt
        .query_row(params![user_id], |row| Ok(parse_audit_row(row)))
        .optional()?;
    row.transpose()
}

pub fn needs_review_count(conn: &Connection, user_id: UserId) -> RepoResult<u32> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM inbox_log WHERE user_id = ?1 AND processed = 0;",
        params![user_id],
        |row| row.get::<_, u32>(0),
    )?;
    Ok(count)
}

/// Drops a record entirely; used when the user cancels a capture.
pub fn delete(conn: &Connection, user_id: UserId, id: AuditId) -> RepoResult<()> {
    let changed = conn.execute(
        "DELETE FROM inbox_log WHERE id = ?1 AND user_id = ?2;",
        params![id.to_string(), user_id],
    )?;
    if changed == 0 {
        return Err(RepoError::AuditNotFound(id));
    }
    Ok(())
}

fn parse_audit_row(row: &Row<'_>) -> RepoResult<AuditRecord> {
    let raw_id: String = row.get("id")?;
    let id = Uuid::parse_str(&raw_id)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{raw_id}` in inbox_log.id")))?;

    let response_raw: String = row.get("response_json")?;
    let response_json = serde_json::from_str(&response_raw)
        .map_err(|err| RepoError::InvalidData(format!("invalid response payload: {err}")))?;

    Ok(AuditRecord {
        id,
        user_id: row.get("user_id")?,
        raw_message: row.get("raw_message")?,
        source: row.get("source")?,
        category: row.get("category")?,
        confidence: row.get("confidence")?,
        title: row.get("title")?,
        response_json,
        processed: row.get::<_, i64>("processed")? != 0,
        target_id: row
            .get::<_, Option<String>>("target_id")?
            .map(|raw| {
                Uuid::parse_str(&raw).map_err(|_| {
                    RepoError::InvalidData(format!(
                        "invalid uuid `{raw}` in inbox_log.target_id"
                    ))
                })
            })
            .transpose()?,
        created_at: row.get("created_at")?,
    })
}
