//! Dynamic form state synchronization.
//!
//! # Responsibility
//! - Collect heterogeneous control values (text, single choice, multi choice)
//!   into one normalized, typed state.
//! - Submit that state as a relational mutation payload, for new records or
//!   for edits of stored ones.
//!
//! # Invariants
//! - Identifier fields only ever hold integers.
//! - Multi-choice fields are sets: toggling is idempotent.
//! - State transitions are value replacements, never in-place edits.

pub mod contract;
pub mod error;
pub mod field;
pub mod payload;
pub mod record;
pub mod session;
pub mod state;
pub mod synchronizer;
