//! Collaborator contracts consumed by the form synchronizer.
//!
//! # Invariants
//! - Providers may return empty lists; forms mount without defaults then.
//! - Executors own retry, transport and caching policy. The synchronizer
//!   invokes them exactly once per submit and propagates the result as-is.

use crate::form::error::MutationError;
use crate::form::payload::FormPayload;
use crate::model::catalog::ReferenceLists;
use std::error::Error;

/// Supplies the reference lists used to populate selection controls.
pub trait CatalogQueryProvider {
    type Error: Error;

    /// Loads authors, categories and types. Re-invoked by callers to refresh.
    fn reference_lists(&self) -> Result<ReferenceLists, Self::Error>;
}

/// Persists a normalized payload and returns the created record.
#[allow(async_fn_in_trait)]
pub trait MutationExecutor {
    type Output;

    async fn execute(&self, payload: &FormPayload) -> Result<Self::Output, MutationError>;
}
