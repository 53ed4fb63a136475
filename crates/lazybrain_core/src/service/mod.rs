//! Service layer: multi-step operations built on the repositories.
//!
//! # Responsibility
//! - Compose repository calls into transactional business operations.
//! - Keep transports (chat, CLI, schedulers) free of domain rules.
//!
//! # Invariants
//! - Every mutation of existing items records an undo snapshot in the
//!   same transaction it commits.

pub mod capture;
pub mod lifecycle;
pub mod report;
pub mod resolver;
pub mod undo;
