//! Lifecycle engine: transactional mutations of existing items.
//!
//! # Responsibility
//! - Apply status transitions, completions, deletions, reprioritizing,
//!   rescheduling and bucket moves.
//! - Snapshot the pre-mutation state into the undo log alongside every
//!   change.
//!
//! # Invariants
//! - Validation happens before the undo snapshot is written, so an
//!   illegal request leaves both the item and the log untouched.
//! - Completing a recurrence template spawns its successor in the same
//!   transaction; crash recovery never sees one without the other.
//!
//! # See also
//! - `model::item::ItemStatus::can_transition` for the transition table.
//! - `service::undo` for the inverse operation.

use crate::config::CoreConfig;
use crate::model::item::{
    now_epoch_ms, CapturedItem, Category, ItemId, ItemStatus, Priority, UserId,
};
use crate::model::recurrence::{next_occurrence, spawn_successor};
use crate::model::undo::UndoAction;
use crate::repo::item_repo::{ItemRepository, RepoError, SqliteItemRepository};
use crate::repo::undo_repo;
use chrono::NaiveDate;
use log::info;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure of a lifecycle operation.
#[derive(Debug)]
pub enum LifecycleError {
    InvalidTransition { from: ItemStatus, to: ItemStatus },
    IllegalForCategory { category: Category, what: &'static str },
    Repo(RepoError),
}

impl Display for LifecycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTransition { from, to } => {
                write!(f, "illegal status transition {from} -> {to}")
            }
            Self::IllegalForCategory { category, what } => {
                write!(f, "{what} is not legal for bucket `{category}`")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LifecycleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for LifecycleError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for LifecycleError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

/// Result of completing an item.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOutcome {
    /// The item in its completed state.
    pub item: CapturedItem,
    /// Recurrence successor, when the completed item was a template.
    pub successor: Option<CapturedItem>,
}

/// Transactional mutation engine over the item store.
pub struct LifecycleEngine {
    config: CoreConfig,
}

impl LifecycleEngine {
    pub fn new(config: CoreConfig) -> Self {
        Self { config }
    }

    /// Completes an item, spawning the recurrence successor when the
    /// item is a template. Uses today's wall-clock date as the
    /// recurrence anchor.
    pub fn complete(
        &self,
        conn: &mut Connection,
        user_id: UserId,
        id: ItemId,
    ) -> Result<CompletionOutcome, LifecycleError> {
        let today = chrono::Utc::now().date_naive();
        self.complete_on(conn, user_id, id, today)
    }

    /// Completion with an explicit anchor date, for deterministic tests
    /// and backfills.
    pub fn complete_on(
        &self,
        conn: &mut Connection,
        user_id: UserId,
        id: ItemId,
        today: NaiveDate,
    ) -> Result<CompletionOutcome, LifecycleError> {
        let tx = conn.transaction()?;
        let outcome = self.complete_in_tx(&tx, user_id, id, today)?;
        tx.commit()?;
        info!(
            "event=item_completed module=lifecycle item_id={} recurrence_spawned={}",
            outcome.item.id,
            outcome.successor.is_some()
        );
        Ok(outcome)
    }

    /// Deletes an item, keeping a restorable snapshot in the undo log.
    pub fn delete(
        &self,
        conn: &mut Connection,
        user_id: UserId,
        id: ItemId,
    ) -> Result<CapturedItem, LifecycleError> {
        let tx = conn.transaction()?;
        let repo = SqliteItemRepository::new(&tx);
        let item = repo.get_item(user_id, id)?;
        undo_repo::push(
            &tx,
            user_id,
            UndoAction::Delete,
            &item,
            self.config.undo_capacity,
        )?;
        repo.delete_item(user_id, id)?;
        tx.commit()?;
        info!("event=item_deleted module=lifecycle item_id={id}");
        Ok(item)
    }

    pub fn set_priority(
        &self,
        conn: &mut Connection,
        user_id: UserId,
        id: ItemId,
        priority: Priority,
    ) -> Result<CapturedItem, LifecycleError> {
        let tx = conn.transaction()?;
        let repo = SqliteItemRepository::new(&tx);
        let mut item = repo.get_item(user_id, id)?;
        undo_repo::push(
            &tx,
            user_id,
            UndoAction::PriorityChange,
            &item,
            self.config.undo_capacity,
        )?;
        item.priority = priority;
        item.updated_at = now_epoch_ms();
        repo.update_item(user_id, &item)?;
        tx.commit()?;
        Ok(item)
    }

    /// Sets the bucket-appropriate scheduling date (due date for tasks
    /// and projects, follow-up date for contacts). Ideas carry none.
    pub fn set_schedule_date(
        &self,
        conn: &mut Connection,
        user_id: UserId,
        id: ItemId,
        date: Option<NaiveDate>,
    ) -> Result<CapturedItem, LifecycleError> {
        let tx = conn.transaction()?;
        let repo = SqliteItemRepository::new(&tx);
        let mut item = repo.get_item(user_id, id)?;
        if date.is_some() && !item.category.allows_due_date() && !item.category.allows_follow_up() {
            return Err(LifecycleError::IllegalForCategory {
                category: item.category,
                what: "a scheduling date",
            });
        }
        undo_repo::push(
            &tx,
            user_id,
            UndoAction::DateChange,
            &item,
            self.config.undo_capacity,
        )?;
        item.set_schedule_date(date);
        item.updated_at = now_epoch_ms();
        repo.update_item(user_id, &item)?;
        tx.commit()?;
        Ok(item)
    }

    /// Applies a status transition. Transitions to `Completed` are
    /// routed through the completion path so recurrence spawning and
    /// timestamps stay in one place.
    pub fn set_status(
        &self,
        conn: &mut Connection,
        user_id: UserId,
        id: ItemId,
        to: ItemStatus,
    ) -> Result<CompletionOutcome, LifecycleError> {
        if to == ItemStatus::Completed {
            return self.complete(conn, user_id, id);
        }

        let tx = conn.transaction()?;
        let repo = SqliteItemRepository::new(&tx);
        let mut item = repo.get_item(user_id, id)?;

        if !ItemStatus::can_transition(item.status, to, item.category) {
            return Err(LifecycleError::InvalidTransition {
                from: item.status,
                to,
            });
        }

        undo_repo::push(
            &tx,
            user_id,
            UndoAction::StatusChange,
            &item,
            self.config.undo_capacity,
        )?;
        item.status = to;
        item.updated_at = now_epoch_ms();
        repo.update_item(user_id, &item)?;
        tx.commit()?;
        info!("event=status_changed module=lifecycle item_id={id} to={to}");
        Ok(CompletionOutcome {
            item,
            successor: None,
        })
    }

    /// Moves an item to a different bucket, dropping variant fields the
    /// target bucket cannot carry and normalizing `Paused` away from
    /// non-projects.
    pub fn move_item(
        &self,
        conn: &mut Connection,
        user_id: UserId,
        id: ItemId,
        target: Category,
    ) -> Result<CapturedItem, LifecycleError> {
        let tx = conn.transaction()?;
        let item = self.move_in_tx(&tx, user_id, id, target)?;
        tx.commit()?;
        info!("event=item_moved module=lifecycle item_id={id} to={target}");
        Ok(item)
    }

    /// Move body, callable from a caller-owned transaction so related
    /// writes (audit routing) commit with the move or not at all.
    pub(crate) fn move_in_tx(
        &self,
        tx: &rusqlite::Transaction<'_>,
        user_id: UserId,
        id: ItemId,
        target: Category,
    ) -> Result<CapturedItem, LifecycleError> {
        let repo = SqliteItemRepository::new(tx);
        let mut item = repo.get_item(user_id, id)?;
        if item.category == target {
            return Ok(item);
        }

        undo_repo::push(
            tx,
            user_id,
            UndoAction::Move,
            &item,
            self.config.undo_capacity,
        )?;

        item.category = target;
        if !target.allows_due_date() {
            item.due_date = None;
            item.next_action = None;
        }
        if !target.allows_follow_up() {
            item.follow_up_date = None;
            item.follow_up_reason = None;
        }
        if !target.allows_tags() {
            item.tags.clear();
        }
        if !target.allows_related_item() {
            item.related_item_id = None;
        }
        if !target.allows_recurrence() {
            item.recurrence = None;
        }
        if item.status == ItemStatus::Paused && !target.allows_paused() {
            item.status = ItemStatus::Active;
        }
        item.updated_at = now_epoch_ms();
        repo.update_item(user_id, &item)?;
        Ok(item)
    }

    pub(crate) fn complete_in_tx(
        &self,
        tx: &rusqlite::Transaction<'_>,
        user_id: UserId,
        id: ItemId,
        today: NaiveDate,
    ) -> Result<CompletionOutcome, LifecycleError> {
        let repo = SqliteItemRepository::new(tx);
        let mut item = repo.get_item(user_id, id)?;

        if !ItemStatus::can_transition(item.status, ItemStatus::Completed, item.category) {
            return Err(LifecycleError::InvalidTransition {
                from: item.status,
                to: ItemStatus::Completed,
            });
        }

        undo_repo::push(
            tx,
            user_id,
            UndoAction::Complete,
            &item,
            self.config.undo_capacity,
        )?;

        item.status = ItemStatus::Completed;
        let now = now_epoch_ms();
        item.updated_at = now;
        item.completed_at = Some(now);
        repo.update_item(user_id, &item)?;

        let successor = match item.recurrence.as_ref().filter(|rule| rule.is_template) {
            Some(rule) => {
                let next_date = next_occurrence(rule, today);
                let next = spawn_successor(&item, next_date);
                repo.create_item(&next)?;
                Some(next)
            }
            None => None,
        };

        Ok(CompletionOutcome { item, successor })
    }
}
