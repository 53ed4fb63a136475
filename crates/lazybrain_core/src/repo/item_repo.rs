//! Item store adapter: contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD APIs over the tagged `items` table.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths must call `CapturedItem::validate()` before SQL
//!   mutations.
//! - Every operation is scoped to a caller-supplied user id; rows owned
//!   by another user fail with `NotAuthorized` to avoid leaking
//!   existence.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::audit::AuditId;
use crate::model::item::{
    CapturedItem, Category, ItemId, ItemStatus, ItemValidationError, Priority, UserId,
};
use crate::model::recurrence::RecurrenceRule;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ITEM_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    category,
    title,
    notes,
    status,
    priority,
    due_date,
    next_action,
    follow_up_date,
    follow_up_reason,
    tags,
    related_item_id,
    recurrence,
    audit_id,
    created_at,
    updated_at,
    completed_at
FROM items";

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for item/audit/undo persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(ItemValidationError),
    Db(DbError),
    NotFound(ItemId),
    /// Cross-user access attempt; callers surface this as a generic
    /// not-found.
    NotAuthorized(ItemId),
    /// Routing replay: the audit record already left the pending state.
    AlreadyProcessed(AuditId),
    AuditNotFound(AuditId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "item not found: {id}"),
            Self::NotAuthorized(id) => write!(f, "item not owned by caller: {id}"),
            Self::AlreadyProcessed(id) => write!(f, "audit record already processed: {id}"),
            Self::AuditNotFound(id) => write!(f, "audit record not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ItemValidationError> for RepoError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Result ordering for item listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListOrder {
    /// Insertion order (creation time).
    #[default]
    Insertion,
    /// Scheduling date ascending, undated items last.
    ScheduleDate,
}

/// Query options for listing items.
#[derive(Debug, Clone, Default)]
pub struct ItemListQuery {
    pub category: Option<Category>,
    /// Empty means all statuses.
    pub statuses: Vec<ItemStatus>,
    /// Filter on the bucket-appropriate scheduling date.
    pub scheduled_on_or_before: Option<NaiveDate>,
    pub scheduled_on: Option<NaiveDate>,
    pub min_priority: Option<Priority>,
    /// Completed at or after this epoch-millisecond instant.
    pub completed_since_ms: Option<i64>,
    pub order: ListOrder,
    pub limit: Option<u32>,
}

/// Repository interface for item CRUD operations, all scoped by user.
pub trait ItemRepository {
    fn create_item(&self, item: &CapturedItem) -> RepoResult<ItemId>;
    fn get_item(&self, user_id: UserId, id: ItemId) -> RepoResult<CapturedItem>;
    fn update_item(&self, user_id: UserId, item: &CapturedItem) -> RepoResult<()>;
    fn delete_item(&self, user_id: UserId, id: ItemId) -> RepoResult<()>;
    fn list_items(&self, user_id: UserId, query: &ItemListQuery) -> RepoResult<Vec<CapturedItem>>;
}

/// SQLite-backed item repository.
pub struct SqliteItemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteItemRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// One random active idea for the morning report's spark section.
    pub fn random_idea(&self, user_id: UserId) -> RepoResult<Option<CapturedItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             WHERE user_id = ?1 AND category = 'idea' AND status = 'active'
             ORDER BY RANDOM() LIMIT 1;"
        ))?;
        let row = stmt
            .query_row(params![user_id], |row| Ok(RowHolder::capture(row)))
            .optional()?;
        row.transpose()
    }

    /// Per-bucket count of non-completed items, for the weekly report.
    pub fn open_count(&self, user_id: UserId, category: Category) -> RepoResult<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM items
             WHERE user_id = ?1 AND category = ?2 AND status != 'completed';",
            params![user_id, category.as_str()],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(count)
    }

    fn fetch_owned(&self, user_id: UserId, id: ItemId) -> RepoResult<CapturedItem> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ITEM_SELECT_SQL} WHERE id = ?1;"))?;
        let item = stmt
            .query_row(params![id.to_string()], |row| Ok(RowHolder::capture(row)))
            .optional()?
            .transpose()?
            .ok_or(RepoError::NotFound(id))?;

        if item.user_id != user_id {
            return Err(RepoError::NotAuthorized(id));
        }
        Ok(item)
    }
}

impl ItemRepository for SqliteItemRepository<'_> {
    fn create_item(&self, item: &CapturedItem) -> RepoResult<ItemId> {
        item.validate()?;

        self.conn.execute(
            "INSERT INTO items (
                id, user_id, category, title, notes, status, priority,
                due_date, next_action, follow_up_date, follow_up_reason,
                tags, related_item_id, recurrence, audit_id,
                created_at, updated_at, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                      ?13, ?14, ?15, ?16, ?17, ?18);",
            params![
                item.id.to_string(),
                item.user_id,
                item.category.as_str(),
                item.title.as_str(),
                item.notes.as_deref(),
                item.status.as_str(),
                item.priority.as_str(),
                date_to_db(item.due_date),
                item.next_action.as_deref(),
                date_to_db(item.follow_up_date),
                item.follow_up_reason.as_deref(),
                tags_to_db(&item.tags)?,
                item.related_item_id.map(|id| id.to_string()),
                recurrence_to_db(item.recurrence.as_ref())?,
                item.audit_id.map(|id| id.to_string()),
                item.created_at,
                item.updated_at,
                item.completed_at,
            ],
        )?;

        Ok(item.id)
    }

    fn get_item(&self, user_id: UserId, id: ItemId) -> RepoResult<CapturedItem> {
        self.fetch_owned(user_id, id)
    }

    fn update_item(&self, user_id: UserId, item: &CapturedItem) -> RepoResult<()> {
        item.validate()?;
        // Ownership check first so a foreign row never looks like NotFound.
        let _ = self.fetch_owned(user_id, item.id)?;

        self.conn.execute(
            "UPDATE items
             SET
                category = ?1,
                title = ?2,
                notes = ?3,
                status = ?4,
                priority = ?5,
                due_date = ?6,
                next_action = ?7,
                follow_up_date = ?8,
                follow_up_reason = ?9,
                tags = ?10,
                related_item_id = ?11,
                recurrence = ?12,
                audit_id = ?13,
                updated_at = ?14,
                completed_at = ?15
             WHERE id = ?16;",
            params![
                item.category.as_str(),
                item.title.as_str(),
                item.notes.as_deref(),
                item.status.as_str(),
                item.priority.as_str(),
                date_to_db(item.due_date),
                item.next_action.as_deref(),
                date_to_db(item.follow_up_date),
                item.follow_up_reason.as_deref(),
                tags_to_db(&item.tags)?,
                item.related_item_id.map(|id| id.to_string()),
                recurrence_to_db(item.recurrence.as_ref())?,
                item.audit_id.map(|id| id.to_string()),
                item.updated_at,
                item.completed_at,
                item.id.to_string(),
            ],
        )?;

        Ok(())
    }

    fn delete_item(&self, user_id: UserId, id: ItemId) -> RepoResult<()> {
        let _ = self.fetch_owned(user_id, id)?;
        self.conn
            .execute("DELETE FROM items WHERE id = ?1;", [id.to_string()])?;
        Ok(())
    }

    fn list_items(&self, user_id: UserId, query: &ItemListQuery) -> RepoResult<Vec<CapturedItem>> {
        let mut sql = format!("{ITEM_SELECT_SQL} WHERE user_id = ?");
        let mut bind_values: Vec<Value> = vec![Value::Integer(user_id)];

        if let Some(category) = query.category {
            sql.push_str(" AND category = ?");
            bind_values.push(Value::Text(category.as_str().to_string()));
        }

        if !query.statuses.is_empty() {
            let placeholders = vec!["?"; query.statuses.len()].join(", ");
            sql.push_str(&format!(" AND status IN ({placeholders})"));
            for status in &query.statuses {
                bind_values.push(Value::Text(status.as_str().to_string()));
            }
        }

        if let Some(date) = query.scheduled_on_or_before {
            sql.push_str(" AND COALESCE(due_date, follow_up_date) <= ?");
            bind_values.push(Value::Text(date.to_string()));
        }

        if let Some(date) = query.scheduled_on {
            sql.push_str(" AND COALESCE(due_date, follow_up_date) = ?");
            bind_values.push(Value::Text(date.to_string()));
        }

        if let Some(min) = query.min_priority {
            let accepted: Vec<&str> = [
                Priority::Low,
                Priority::Medium,
                Priority::High,
                Priority::Urgent,
            ]
            .iter()
            .filter(|p| **p >= min)
            .map(|p| p.as_str())
            .collect();
            let placeholders = vec!["?"; accepted.len()].join(", ");
            sql.push_str(&format!(" AND priority IN ({placeholders})"));
            for label in accepted {
                bind_values.push(Value::Text(label.to_string()));
            }
        }

        if let Some(since) = query.completed_since_ms {
            sql.push_str(" AND completed_at >= ?");
            bind_values.push(Value::Integer(since));
        }

        match query.order {
            ListOrder::Insertion => sql.push_str(" ORDER BY created_at ASC, id ASC"),
            ListOrder::ScheduleDate => sql.push_str(
                " ORDER BY COALESCE(due_date, follow_up_date) ASC NULLS LAST, created_at ASC",
            ),
        }

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();

        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }

        Ok(items)
    }
}

// Wrapper keeping rusqlite's row-mapping closure infallible; decoding
// errors surface through the outer RepoResult.
struct RowHolder;

impl RowHolder {
    fn capture(row: &Row<'_>) -> RepoResult<CapturedItem> {
        parse_item_row(row)
    }
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<CapturedItem> {
    let id = parse_uuid(&row.get::<_, String>("id")?, "items.id")?;

    let category_text: String = row.get("category")?;
    let category = Category::parse_label(&category_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid category `{category_text}` in items.category"))
    })?;

    let status_text: String = row.get("status")?;
    let status = ItemStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_text}` in items.status"))
    })?;

    let priority_text: String = row.get("priority")?;
    let priority = Priority::parse(&priority_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid priority `{priority_text}` in items.priority"
        ))
    })?;

    let tags = match row.get::<_, Option<String>>("tags")? {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|err| RepoError::InvalidData(format!("invalid tags payload: {err}")))?,
        None => Vec::new(),
    };

    let recurrence: Option<RecurrenceRule> = match row.get::<_, Option<String>>("recurrence")? {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|err| {
            RepoError::InvalidData(format!("invalid recurrence payload: {err}"))
        })?),
        None => None,
    };

    let item = CapturedItem {
        id,
        user_id: row.get("user_id")?,
        category,
        title: row.get("title")?,
        notes: row.get("notes")?,
        status,
        priority,
        due_date: parse_date(row.get::<_, Option<String>>("due_date")?, "items.due_date")?,
        next_action: row.get("next_action")?,
        follow_up_date: parse_date(
            row.get::<_, Option<String>>("follow_up_date")?,
            "items.follow_up_date",
        )?,
        follow_up_reason: row.get("follow_up_reason")?,
        tags,
        related_item_id: row
            .get::<_, Option<String>>("related_item_id")?
            .map(|raw| parse_uuid(&raw, "items.related_item_id"))
            .transpose()?,
        recurrence,
        audit_id: row
            .get::<_, Option<String>>("audit_id")?
            .map(|raw| parse_uuid(&raw, "items.audit_id"))
            .transpose()?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        completed_at: row.get("completed_at")?,
    };
    item.validate()?;
    Ok(item)
}

fn parse_uuid(raw: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{raw}` in {column}")))
}

fn parse_date(raw: Option<String>, column: &str) -> RepoResult<Option<NaiveDate>> {
    raw.map(|text| {
        NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .map_err(|_| RepoError::InvalidData(format!("invalid date `{text}` in {column}")))
    })
    .transpose()
}

fn date_to_db(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

fn tags_to_db(tags: &[String]) -> RepoResult<Option<String>> {
    if tags.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(tags)
        .map(Some)
        .map_err(|err| RepoError::InvalidData(format!("unserializable tags: {err}")))
}

fn recurrence_to_db(rule: Option<&RecurrenceRule>) -> RepoResult<Option<String>> {
    rule.map(|r| {
        serde_json::to_string(r)
            .map_err(|err| RepoError::InvalidData(format!("unserializable recurrence: {err}")))
    })
    .transpose()
}
