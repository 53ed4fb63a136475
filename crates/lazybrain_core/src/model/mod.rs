//! Unified domain model for the four capture buckets.
//!
//! # Responsibility
//! - Define the canonical tagged item shape shared by all buckets.
//! - Define audit, undo and recurrence records owned by the core.
//!
//! # Invariants
//! - Every domain object is identified by a stable UUID.
//! - Items are mutated only through the lifecycle state machine.

pub mod audit;
pub mod item;
pub mod recurrence;
pub mod undo;
