//! Core logic for the ComicDesk catalog admin.
//!
//! The form synchronizer (`form`) is the single source of truth for how raw
//! control values become typed mutation payloads. Storage (`db`, `repo`) and
//! use-case services (`service`) implement the form collaborator contracts.

pub mod db;
pub mod form;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use form::contract::{CatalogQueryProvider, MutationExecutor};
pub use form::error::{ChangeError, MutationError, SubmitError, ValidationError};
pub use form::field::{Coercion, ControlKind, FieldArity, FieldDescriptor, FormSchema};
pub use form::payload::{FormPayload, PayloadValue};
pub use form::record::FormRecord;
pub use form::session::{FormPhase, FormSession};
pub use form::state::{ChangeEvent, FieldValue, FormState};
pub use form::synchronizer::{FormSynchronizer, SubmitPolicy};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::catalog::{
    Author, CatalogEntry, Category, CoercionError, ComicDraft, ComicListItem, ComicRecord,
    ComicType, EntityId, EntityRef, ReferenceKind, ReferenceLists, ReferenceOption,
};
pub use repo::catalog_repo::{CatalogRepository, RepoError, RepoResult, SqliteCatalogRepository};
pub use service::catalog_service::CatalogService;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
