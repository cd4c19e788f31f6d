//! Catalog domain model.
//!
//! # Responsibility
//! - Define canonical data structures shared by forms, storage and FFI.
//!
//! # Invariants
//! - Every catalog entity is identified by an integer `EntityId`.

pub mod catalog;
