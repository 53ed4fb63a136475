//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Item writes must enforce `CapturedItem::validate()` before SQL
//!   mutations.
//! - Every item access is scoped by user; foreign-user rows fail with
//!   `NotAuthorized`, never `NotFound`.

pub mod audit_repo;
pub mod item_repo;
pub mod pending_repo;
pub mod settings_repo;
pub mod undo_repo;
