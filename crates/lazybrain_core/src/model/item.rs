//! Captured item domain model.
//!
//! # Responsibility
//! - Define the canonical record shared by task/project/contact/idea
//!   buckets as one tagged shape.
//! - Enforce variant-field legality and status invariants.
//!
//! # Invariants
//! - `id` is stable and never reused for another item.
//! - `status == Completed` if and only if `completed_at` is set.
//! - `Paused` is legal for projects only.

use crate::model::recurrence::RecurrenceRule;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every captured item.
pub type ItemId = Uuid;

/// Owning user identifier, validated at the request boundary and passed
/// explicitly through every call.
pub type UserId = i64;

/// Capture bucket tag. One item belongs to exactly one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// One-off errand or life-admin task.
    Task,
    /// Multi-step work with a next action.
    Project,
    /// A person to stay in touch with.
    Contact,
    /// A thought or concept to explore later.
    Idea,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Task,
        Category::Project,
        Category::Contact,
        Category::Idea,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Project => "project",
            Self::Contact => "contact",
            Self::Idea => "idea",
        }
    }

    /// Parses a bucket label, accepting the legacy aliases used by the
    /// classifier vocabulary (`admin`, `person`, plural forms).
    pub fn parse_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "task" | "tasks" | "admin" => Some(Self::Task),
            "project" | "projects" => Some(Self::Project),
            "contact" | "contacts" | "person" | "people" => Some(Self::Contact),
            "idea" | "ideas" => Some(Self::Idea),
            _ => None,
        }
    }

    /// Whether `due_date`/`next_action` are meaningful for this bucket.
    pub fn allows_due_date(self) -> bool {
        matches!(self, Self::Task | Self::Project)
    }

    /// Whether follow-up fields are meaningful for this bucket.
    pub fn allows_follow_up(self) -> bool {
        matches!(self, Self::Contact)
    }

    pub fn allows_tags(self) -> bool {
        matches!(self, Self::Project)
    }

    pub fn allows_related_item(self) -> bool {
        matches!(self, Self::Idea)
    }

    pub fn allows_recurrence(self) -> bool {
        !matches!(self, Self::Idea)
    }

    pub fn allows_paused(self) -> bool {
        matches!(self, Self::Project)
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state shared by all buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Visible and actionable.
    Active,
    /// On hold; projects only.
    Paused,
    /// Parked indefinitely, revivable.
    Someday,
    /// Terminal, except for recurrence successor spawning.
    Completed,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Someday => "someday",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "someday" => Some(Self::Someday),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Whether `from -> to` is a legal transition for `category`.
    ///
    /// `Completed` is terminal; reopening happens only through undo, which
    /// restores a prior snapshot rather than transitioning.
    pub fn can_transition(from: Self, to: Self, category: Category) -> bool {
        if to == Self::Paused && !category.allows_paused() {
            return false;
        }
        match (from, to) {
            (Self::Active, Self::Completed | Self::Someday | Self::Paused) => true,
            (Self::Paused, Self::Active | Self::Someday | Self::Completed) => true,
            (Self::Someday, Self::Active) => true,
            _ => false,
        }
    }
}

impl Display for ItemStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item priority, defaulting to `Medium` on capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// Validation failure for a captured item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    EmptyTitle,
    CompletedWithoutTimestamp,
    TimestampWithoutCompleted,
    PausedOutsideProject(Category),
    FieldNotAllowed {
        category: Category,
        field: &'static str,
    },
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "item title cannot be empty"),
            Self::CompletedWithoutTimestamp => {
                write!(f, "completed item must carry a completion timestamp")
            }
            Self::TimestampWithoutCompleted => {
                write!(f, "non-completed item must not carry a completion timestamp")
            }
            Self::PausedOutsideProject(category) => {
                write!(f, "status `paused` is not legal for bucket `{category}`")
            }
            Self::FieldNotAllowed { category, field } => {
                write!(f, "field `{field}` is not legal for bucket `{category}`")
            }
        }
    }
}

impl Error for ItemValidationError {}

/// Canonical record for all four capture buckets.
///
/// Variant-specific fields are optional so one storage shape serves every
/// bucket without duplicating the lifecycle state machine four times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedItem {
    /// Stable global id used for linking, undo restore and auditing.
    pub id: ItemId,
    /// Owning user; every access is scoped by it.
    pub user_id: UserId,
    /// Bucket tag.
    pub category: Category,
    pub title: String,
    /// Free-form body (classifier summary or user notes).
    pub notes: Option<String>,
    pub status: ItemStatus,
    pub priority: Priority,
    /// Meaningful for tasks and projects.
    pub due_date: Option<NaiveDate>,
    /// Meaningful for tasks and projects.
    pub next_action: Option<String>,
    /// Meaningful for contacts.
    pub follow_up_date: Option<NaiveDate>,
    /// Meaningful for contacts.
    pub follow_up_reason: Option<String>,
    /// Meaningful for projects.
    pub tags: Vec<String>,
    /// Meaningful for ideas.
    pub related_item_id: Option<ItemId>,
    /// Present when this item is a recurrence template.
    pub recurrence: Option<RecurrenceRule>,
    /// Back-reference to the audit record that captured this item.
    pub audit_id: Option<Uuid>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
    /// Unix epoch milliseconds; set exactly when status is `Completed`.
    pub completed_at: Option<i64>,
}

impl CapturedItem {
    /// Creates a new active item with a generated stable id.
    pub fn new(user_id: UserId, category: Category, title: impl Into<String>) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            user_id,
            category,
            title: title.into(),
            notes: None,
            status: ItemStatus::Active,
            priority: Priority::Medium,
            due_date: None,
            next_action: None,
            follow_up_date: None,
            follow_up_reason: None,
            tags: Vec::new(),
            related_item_id: None,
            recurrence: None,
            audit_id: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Validates bucket/status/field invariants.
    ///
    /// # Errors
    /// - Empty title.
    /// - Completion timestamp out of sync with status.
    /// - `Paused` on a non-project bucket.
    /// - Variant fields set on a bucket that does not carry them.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        if self.title.trim().is_empty() {
            return Err(ItemValidationError::EmptyTitle);
        }
        match (self.status, self.completed_at) {
            (ItemStatus::Completed, None) => {
                return Err(ItemValidationError::CompletedWithoutTimestamp)
            }
            (status, Some(_)) if status != ItemStatus::Completed => {
                return Err(ItemValidationError::TimestampWithoutCompleted)
            }
            _ => {}
        }
        if self.status == ItemStatus::Paused && !self.category.allows_paused() {
            return Err(ItemValidationError::PausedOutsideProject(self.category));
        }

        if !self.category.allows_due_date() {
            if self.due_date.is_some() {
                return Err(self.field_not_allowed("due_date"));
            }
            if self.next_action.is_some() {
                return Err(self.field_not_allowed("next_action"));
            }
        }
        if !self.category.allows_follow_up() {
            if self.follow_up_date.is_some() {
                return Err(self.field_not_allowed("follow_up_date"));
            }
            if self.follow_up_reason.is_some() {
                return Err(self.field_not_allowed("follow_up_reason"));
            }
        }
        if !self.category.allows_tags() && !self.tags.is_empty() {
            return Err(self.field_not_allowed("tags"));
        }
        if !self.category.allows_related_item() && self.related_item_id.is_some() {
            return Err(self.field_not_allowed("related_item_id"));
        }
        if !self.category.allows_recurrence() && self.recurrence.is_some() {
            return Err(self.field_not_allowed("recurrence"));
        }

        Ok(())
    }

    /// The scheduling date for this item: due date for tasks/projects,
    /// follow-up date for contacts.
    pub fn schedule_date(&self) -> Option<NaiveDate> {
        self.due_date.or(self.follow_up_date)
    }

    /// Sets the bucket-appropriate scheduling date.
    pub fn set_schedule_date(&mut self, date: Option<NaiveDate>) {
        if self.category.allows_follow_up() {
            self.follow_up_date = date;
        } else {
            self.due_date = date;
        }
    }

    fn field_not_allowed(&self, field: &'static str) -> ItemValidationError {
        ItemValidationError::FieldNotAllowed {
            category: self.category,
            field,
        }
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::{CapturedItem, Category, ItemStatus, ItemValidationError};

    #[test]
    fn new_item_is_active_and_valid() {
        let item = CapturedItem::new(1, Category::Task, "renew license");
        assert_eq!(item.status, ItemStatus::Active);
        item.validate().expect("fresh item must validate");
    }

    #[test]
    fn completed_requires_timestamp() {
        let mut item = CapturedItem::new(1, Category::Task, "renew license");
        item.status = ItemStatus::Completed;
        assert_eq!(
            item.validate(),
            Err(ItemValidationError::CompletedWithoutTimestamp)
        );
    }

    #[test]
    fn paused_is_projects_only() {
        let mut task = CapturedItem::new(1, Category::Task, "renew license");
        task.status = ItemStatus::Paused;
        assert!(matches!(
            task.validate(),
            Err(ItemValidationError::PausedOutsideProject(Category::Task))
        ));

        let mut project = CapturedItem::new(1, Category::Project, "patio build");
        project.status = ItemStatus::Paused;
        project.validate().expect("paused project must validate");
    }

    #[test]
    fn variant_fields_are_rejected_on_foreign_buckets() {
        let mut idea = CapturedItem::new(1, Category::Idea, "blue one is better");
        idea.next_action = Some("sketch it".to_string());
        assert!(matches!(
            idea.validate(),
            Err(ItemValidationError::FieldNotAllowed {
                field: "next_action",
                ..
            })
        ));
    }

    #[test]
    fn transition_table_matches_state_machine() {
        use ItemStatus::*;
        assert!(ItemStatus::can_transition(Active, Someday, Category::Task));
        assert!(ItemStatus::can_transition(
            Active,
            Paused,
            Category::Project
        ));
        assert!(!ItemStatus::can_transition(Active, Paused, Category::Task));
        assert!(ItemStatus::can_transition(Someday, Active, Category::Idea));
        assert!(!ItemStatus::can_transition(
            Someday,
            Completed,
            Category::Task
        ));
        assert!(!ItemStatus::can_transition(
            Completed,
            Active,
            Category::Task
        ));
    }

    #[test]
    fn category_labels_accept_classifier_aliases() {
        assert_eq!(Category::parse_label("admin"), Some(Category::Task));
        assert_eq!(Category::parse_label("people"), Some(Category::Contact));
        assert_eq!(Category::parse_label("Projects"), Some(Category::Project));
        assert_eq!(Category::parse_label("nonsense"), None);
    }
}
