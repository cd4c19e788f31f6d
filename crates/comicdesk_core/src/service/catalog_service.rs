//! Catalog use-case service.
//!
//! # Responsibility
//! - Provide list/detail/create/update/delete entry points for catalog pages.
//! - Serve reference lists to forms (`CatalogQueryProvider`).
//! - Persist submitted form payloads (`MutationExecutor` adapters).
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Created and updated records are read back from storage before being
//!   returned.
//! - Executor failures carry one of the `*_CODE` machine-readable codes.

use crate::form::contract::{CatalogQueryProvider, MutationExecutor};
use crate::form::error::MutationError;
use crate::form::payload::FormPayload;
use crate::model::catalog::{
    Author, Category, ComicDraft, ComicListItem, ComicRecord, ComicType, EntityId,
    ReferenceLists, ReferenceOption,
};
use crate::repo::catalog_repo::{CatalogRepository, RepoError, RepoResult};
use log::{info, warn};

pub const VALIDATION_FAILED_CODE: &str = "validation_failed";
pub const NOT_FOUND_CODE: &str = "not_found";
pub const STORAGE_ERROR_CODE: &str = "storage_error";
pub const INCONSISTENT_STATE_CODE: &str = "inconsistent_state";

/// Use-case service wrapper for catalog operations.
pub struct CatalogService<R: CatalogRepository> {
    repo: R,
}

impl<R: CatalogRepository> CatalogService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn list_authors(&self) -> RepoResult<Vec<Author>> {
        self.repo.list_authors()
    }

    pub fn get_author(&self, id: EntityId) -> RepoResult<Option<Author>> {
        self.repo.get_author(id)
    }

    /// Creates an author and returns the stored record.
    pub fn create_author(&self, name: &str, gender: Option<&str>) -> RepoResult<Author> {
        let id = self.repo.create_author(name, gender)?;
        info!("event=author_create module=service status=ok author_id={id}");
        self.repo
            .get_author(id)?
            .ok_or_else(|| read_back_missing("author", id))
    }

    /// Updates an author and returns the stored record.
    pub fn update_author(
        &self,
        id: EntityId,
        name: &str,
        gender: Option<&str>,
    ) -> RepoResult<Author> {
        self.repo.update_author(id, name, gender)?;
        info!("event=author_update module=service status=ok author_id={id}");
        self.repo
            .get_author(id)?
            .ok_or_else(|| read_back_missing("author", id))
    }

    pub fn list_categories(&self) -> RepoResult<Vec<Category>> {
        self.repo.list_categories()
    }

    pub fn get_category(&self, id: EntityId) -> RepoResult<Option<Category>> {
        self.repo.get_category(id)
    }

    pub fn create_category(&self, name: &str) -> RepoResult<Category> {
        let id = self.repo.create_category(name)?;
        info!("event=category_create module=service status=ok category_id={id}");
        self.repo
            .get_category(id)?
            .ok_or_else(|| read_back_missing("category", id))
    }

    pub fn update_category(&self, id: EntityId, name: &str) -> RepoResult<Category> {
        self.repo.update_category(id, name)?;
        info!("event=category_update module=service status=ok category_id={id}");
        self.repo
            .get_category(id)?
            .ok_or_else(|| read_back_missing("category", id))
    }

    pub fn delete_category(&self, id: EntityId) -> RepoResult<()> {
        self.repo.delete_category(id)?;
        info!("event=category_delete module=service status=ok category_id={id}");
        Ok(())
    }

    pub fn list_types(&self) -> RepoResult<Vec<ComicType>> {
        self.repo.list_types()
    }

    pub fn create_type(&self, name: &str) -> RepoResult<ComicType> {
        let id = self.repo.create_type(name)?;
        info!("event=type_create module=service status=ok type_id={id}");
        Ok(ComicType {
            id,
            name: name.trim().to_string(),
        })
    }

    pub fn list_comics(&self) -> RepoResult<Vec<ComicListItem>> {
        self.repo.list_comics()
    }

    pub fn get_comic(&self, id: EntityId) -> RepoResult<Option<ComicRecord>> {
        self.repo.get_comic(id)
    }

    /// Creates a comic with its category links and returns the stored record.
    pub fn create_comic(&self, draft: &ComicDraft) -> RepoResult<ComicRecord> {
        let id = self.repo.create_comic(draft)?;
        info!(
            "event=comic_create module=service status=ok comic_id={id} categories={}",
            draft.category_ids.len()
        );
        self.repo
            .get_comic(id)?
            .ok_or_else(|| read_back_missing("comic", id))
    }

    /// Updates a comic and replaces its category links.
    ///
    /// The comic keeps its id; the returned record is read back.
    pub fn update_comic(&self, id: EntityId, draft: &ComicDraft) -> RepoResult<ComicRecord> {
        self.repo.update_comic(id, draft)?;
        info!(
            "event=comic_update module=service status=ok comic_id={id} categories={}",
            draft.category_ids.len()
        );
        self.repo
            .get_comic(id)?
            .ok_or_else(|| read_back_missing("comic", id))
    }

    /// Executor for the comic form.
    pub fn comic_executor(&self) -> CreateComicExecutor<'_, R> {
        CreateComicExecutor { service: self }
    }

    /// Executor for the comic edit form of comic `id`.
    pub fn comic_update_executor(&self, id: EntityId) -> UpdateComicExecutor<'_, R> {
        UpdateComicExecutor { service: self, id }
    }

    /// Executor for the author form.
    pub fn author_executor(&self) -> CreateAuthorExecutor<'_, R> {
        CreateAuthorExecutor { service: self }
    }

    pub fn author_update_executor(&self, id: EntityId) -> UpdateAuthorExecutor<'_, R> {
        UpdateAuthorExecutor { service: self, id }
    }

    /// Executor for the category form.
    pub fn category_executor(&self) -> CreateCategoryExecutor<'_, R> {
        CreateCategoryExecutor { service: self }
    }

    pub fn category_update_executor(&self, id: EntityId) -> UpdateCategoryExecutor<'_, R> {
        UpdateCategoryExecutor { service: self, id }
    }
}

impl<R: CatalogRepository> CatalogQueryProvider for CatalogService<R> {
    type Error = RepoError;

    fn reference_lists(&self) -> Result<ReferenceLists, Self::Error> {
        let authors = self
            .repo
            .list_authors()?
            .into_iter()
            .map(|author| ReferenceOption {
                id: author.id,
                label: author.name,
            })
            .collect();
        let categories = self
            .repo
            .list_categories()?
            .into_iter()
            .map(|category| ReferenceOption {
                id: category.id,
                label: category.name,
            })
            .collect();
        let types = self
            .repo
            .list_types()?
            .into_iter()
            .map(|kind| ReferenceOption {
                id: kind.id,
                label: kind.name,
            })
            .collect();

        Ok(ReferenceLists {
            authors,
            categories,
            types,
        })
    }
}

/// Persists comic form payloads `{name, author, type, categories}`.
pub struct CreateComicExecutor<'svc, R: CatalogRepository> {
    service: &'svc CatalogService<R>,
}

impl<R: CatalogRepository> MutationExecutor for CreateComicExecutor<'_, R> {
    type Output = ComicRecord;

    async fn execute(&self, payload: &FormPayload) -> Result<ComicRecord, MutationError> {
        let draft = comic_draft_from_payload(payload)?;
        self.service
            .create_comic(&draft)
            .map_err(|err| to_mutation_error("comic_create", err))
    }
}

/// Persists author form payloads `{name, gender}`.
pub struct CreateAuthorExecutor<'svc, R: CatalogRepository> {
    service: &'svc CatalogService<R>,
}

impl<R: CatalogRepository> MutationExecutor for CreateAuthorExecutor<'_, R> {
    type Output = Author;

    async fn execute(&self, payload: &FormPayload) -> Result<Author, MutationError> {
        let name = payload.require_text("name")?;
        let gender = payload.optional_text("gender");
        self.service
            .create_author(name, gender)
            .map_err(|err| to_mutation_error("author_create", err))
    }
}

/// Persists category form payloads `{name}`.
pub struct CreateCategoryExecutor<'svc, R: CatalogRepository> {
    service: &'svc CatalogService<R>,
}

impl<R: CatalogRepository> MutationExecutor for CreateCategoryExecutor<'_, R> {
    type Output = Category;

    async fn execute(&self, payload: &FormPayload) -> Result<Category, MutationError> {
        let name = payload.require_text("name")?;
        self.service
            .create_category(name)
            .map_err(|err| to_mutation_error("category_create", err))
    }
}

/// Persists comic edit payloads onto an existing comic.
pub struct UpdateComicExecutor<'svc, R: CatalogRepository> {
    service: &'svc CatalogService<R>,
    id: EntityId,
}

impl<R: CatalogRepository> MutationExecutor for UpdateComicExecutor<'_, R> {
    type Output = ComicRecord;

    async fn execute(&self, payload: &FormPayload) -> Result<ComicRecord, MutationError> {
        let draft = comic_draft_from_payload(payload)?;
        self.service
            .update_comic(self.id, &draft)
            .map_err(|err| to_mutation_error("comic_update", err))
    }
}

pub struct UpdateAuthorExecutor<'svc, R: CatalogRepository> {
    service: &'svc CatalogService<R>,
    id: EntityId,
}

impl<R: CatalogRepository> MutationExecutor for UpdateAuthorExecutor<'_, R> {
    type Output = Author;

    async fn execute(&self, payload: &FormPayload) -> Result<Author, MutationError> {
        let name = payload.require_text("name")?;
        let gender = payload.optional_text("gender");
        self.service
            .update_author(self.id, name, gender)
            .map_err(|err| to_mutation_error("author_update", err))
    }
}

pub struct UpdateCategoryExecutor<'svc, R: CatalogRepository> {
    service: &'svc CatalogService<R>,
    id: EntityId,
}

impl<R: CatalogRepository> MutationExecutor for UpdateCategoryExecutor<'_, R> {
    type Output = Category;

    async fn execute(&self, payload: &FormPayload) -> Result<Category, MutationError> {
        let name = payload.require_text("name")?;
        self.service
            .update_category(self.id, name)
            .map_err(|err| to_mutation_error("category_update", err))
    }
}

/// Decodes the comic form payload into a storage draft.
pub fn comic_draft_from_payload(payload: &FormPayload) -> Result<ComicDraft, MutationError> {
    Ok(ComicDraft {
        name: payload.require_text("name")?.to_string(),
        author_id: payload.require_id("author")?,
        type_id: payload.require_id("type")?,
        category_ids: payload.ids("categories")?.to_vec(),
    })
}

fn to_mutation_error(event: &'static str, err: RepoError) -> MutationError {
    let code = match &err {
        RepoError::Validation(_) => VALIDATION_FAILED_CODE,
        RepoError::NotFound { .. } => NOT_FOUND_CODE,
        RepoError::Db(_) => STORAGE_ERROR_CODE,
        RepoError::InvalidData(_) => INCONSISTENT_STATE_CODE,
    };
    warn!("event={event} module=service status=error error_code={code}");
    MutationError::new(code, err.to_string())
}

fn read_back_missing(entity: &str, id: EntityId) -> RepoError {
    RepoError::InvalidData(format!("{entity} {id} not found in read-back"))
}
