//! Core domain logic for LazyBrain.
//! This crate is the single source of truth for capture/classify/route
//! business invariants; chat transports and schedulers stay outside.

pub mod classify;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use classify::{
    parse_forced_prefix, route_decision, Classification, ClassifiedCategory, Classifier,
    ClassifyError, Intent, RouteDecision,
};
pub use config::CoreConfig;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::audit::{AuditId, AuditRecord};
pub use model::item::{
    CapturedItem, Category, ItemId, ItemStatus, ItemValidationError, Priority, UserId,
};
pub use model::recurrence::{next_occurrence, spawn_successor, RecurrencePattern, RecurrenceRule};
pub use model::undo::{UndoAction, UndoEntry};
pub use repo::item_repo::{
    ItemListQuery, ItemRepository, ListOrder, RepoError, RepoResult, SqliteItemRepository,
};
pub use service::capture::{CapturePipeline, RenderableResult};
pub use service::lifecycle::{CompletionOutcome, LifecycleEngine, LifecycleError};
pub use service::report::{generate_report, ItemSummary, ReportData, ReportKind};
pub use service::undo::{undo_last, UndoOutcome};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
