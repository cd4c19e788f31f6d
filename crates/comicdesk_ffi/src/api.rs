//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose catalog pages and form sessions to Dart via FRB.
//! - Keep error semantics simple: every call returns an envelope with
//!   `ok`, an optional machine-readable `error_code` and a message.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Open forms live in a process-wide registry keyed by a UUID v4 string.
//!   The registry lock is only held to look a session up; each session has
//!   its own lock for the duration of a call.
//! - Sessions idle longer than `SESSION_IDLE_TTL` are evicted when a new form
//!   opens, and at most `MAX_OPEN_SESSIONS` stay open.
//! - Identifier values cross the boundary as `i64`; raw control values
//!   cross as strings and are coerced by the core synchronizer.

use comicdesk_core::db::open_db;
use comicdesk_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    Author, CatalogService, Category, ChangeError, ComicRecord, EntityId, FieldValue,
    FormSchema, FormSession, FormSynchronizer, RepoError, SqliteCatalogRepository, SubmitError,
};
use log::{info, warn};
use once_cell::sync::OnceCell;
use rusqlite::Connection;
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use uuid::Uuid;

const DB_FILE_NAME: &str = "comicdesk.sqlite3";
const DB_PATH_ENV: &str = "COMICDESK_DB_PATH";

const SESSION_IDLE_TTL: Duration = Duration::from_secs(30 * 60);
const MAX_OPEN_SESSIONS: usize = 64;

const SESSION_NOT_FOUND: &str = "session_not_found";
const UNKNOWN_FORM_KIND: &str = "unknown_form_kind";
const INVALID_CHANGE: &str = "invalid_change";
const COERCION_FAILED: &str = "coercion_failed";
const VALIDATION_FAILED: &str = "validation_failed";
const NOT_FOUND: &str = "not_found";
const STORAGE_ERROR: &str = "storage_error";
const INTERNAL_ERROR: &str = "internal_error";

static DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static FORM_SESSIONS: OnceLock<Mutex<HashMap<Uuid, SessionSlot>>> = OnceLock::new();
static SUBMIT_RUNTIME: OnceCell<Runtime> = OnceCell::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts with different level or directory return error.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Row of the comics list page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComicListItemView {
    pub id: i64,
    pub name: String,
    pub author_name: String,
}

/// Comic detail with related ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComicDetailView {
    pub id: i64,
    pub name: String,
    pub author_id: i64,
    pub type_id: i64,
    /// Ascending.
    pub category_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorView {
    pub id: i64,
    pub name: String,
    pub gender: Option<String>,
}

/// Category or type entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedItemView {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComicListResponse {
    pub ok: bool,
    pub items: Vec<ComicListItemView>,
    pub error_code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComicDetailResponse {
    pub ok: bool,
    pub comic: Option<ComicDetailView>,
    pub error_code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorListResponse {
    pub ok: bool,
    pub items: Vec<AuthorView>,
    pub error_code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorDetailResponse {
    pub ok: bool,
    pub author: Option<AuthorView>,
    pub error_code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedListResponse {
    pub ok: bool,
    pub items: Vec<NamedItemView>,
    pub error_code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedDetailResponse {
    pub ok: bool,
    pub item: Option<NamedItemView>,
    pub error_code: Option<String>,
    pub message: String,
}

/// Generic action response envelope for catalog commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogActionResponse {
    pub ok: bool,
    /// Id of the created or affected record.
    pub id: Option<i64>,
    pub error_code: Option<String>,
    pub message: String,
}

/// One form field as seen by the UI.
///
/// Exactly one of `text`, `id` or `ids` is meaningful, according to `shape`
/// (`text|id|id_set`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFieldView {
    pub field: String,
    pub shape: String,
    pub text: Option<String>,
    pub id: Option<i64>,
    pub ids: Vec<i64>,
}

/// Form session response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormResponse {
    pub ok: bool,
    pub session_id: Option<String>,
    /// `mounted|editing|submitting|submitted_success|closed`.
    pub phase: String,
    /// `create|edit`; empty on failures without a session.
    pub mode: String,
    pub fields: Vec<FormFieldView>,
    /// Whether the last change altered the state.
    pub changed: bool,
    /// Id of the record created or updated by a successful submit.
    pub record_id: Option<i64>,
    pub error_code: Option<String>,
    pub message: String,
}

/// Lists comics in id order.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn catalog_list_comics() -> ComicListResponse {
    match with_catalog_service(|service| service.list_comics().map_err(Failure::from)) {
        Ok(rows) => ComicListResponse {
            ok: true,
            message: format!("Found {} comic(s).", rows.len()),
            items: rows
                .into_iter()
                .map(|row| ComicListItemView {
                    id: row.id,
                    name: row.name,
                    author_name: row.author_name,
                })
                .collect(),
            error_code: None,
        },
        Err(failure) => ComicListResponse {
            ok: false,
            items: Vec::new(),
            error_code: Some(failure.code.to_string()),
            message: format!("catalog_list_comics failed: {}", failure.message),
        },
    }
}

/// Loads one comic with its author, type and category ids.
#[flutter_rust_bridge::frb(sync)]
pub fn catalog_get_comic(id: i64) -> ComicDetailResponse {
    let result = with_catalog_service(|service| {
        service
            .get_comic(id)?
            .ok_or_else(|| record_not_found("comic", id))
    });
    match result {
        Ok(comic) => ComicDetailResponse {
            ok: true,
            comic: Some(to_comic_detail(comic)),
            error_code: None,
            message: "Comic loaded.".to_string(),
        },
        Err(failure) => ComicDetailResponse {
            ok: false,
            comic: None,
            error_code: Some(failure.code.to_string()),
            message: format!("catalog_get_comic failed: {}", failure.message),
        },
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn catalog_list_authors() -> AuthorListResponse {
    match with_catalog_service(|service| service.list_authors().map_err(Failure::from)) {
        Ok(authors) => AuthorListResponse {
            ok: true,
            message: format!("Found {} author(s).", authors.len()),
            items: authors.into_iter().map(to_author_view).collect(),
            error_code: None,
        },
        Err(failure) => AuthorListResponse {
            ok: false,
            items: Vec::new(),
            error_code: Some(failure.code.to_string()),
            message: format!("catalog_list_authors failed: {}", failure.message),
        },
    }
}

/// Loads one author for the author detail page.
#[flutter_rust_bridge::frb(sync)]
pub fn catalog_get_author(id: i64) -> AuthorDetailResponse {
    let result = with_catalog_service(|service| {
        service
            .get_author(id)?
            .ok_or_else(|| record_not_found("author", id))
    });
    match result {
        Ok(author) => AuthorDetailResponse {
            ok: true,
            author: Some(to_author_view(author)),
            error_code: None,
            message: "Author loaded.".to_string(),
        },
        Err(failure) => AuthorDetailResponse {
            ok: false,
            author: None,
            error_code: Some(failure.code.to_string()),
            message: format!("catalog_get_author failed: {}", failure.message),
        },
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn catalog_list_categories() -> NamedListResponse {
    let result = with_catalog_service(|service| {
        Ok(service
            .list_categories()?
            .into_iter()
            .map(to_category_view)
            .collect::<Vec<_>>())
    });
    named_list_response("catalog_list_categories", "category", result)
}

/// Loads one category for the category detail page.
#[flutter_rust_bridge::frb(sync)]
pub fn catalog_get_category(id: i64) -> NamedDetailResponse {
    let result = with_catalog_service(|service| {
        service
            .get_category(id)?
            .ok_or_else(|| record_not_found("category", id))
    });
    match result {
        Ok(category) => NamedDetailResponse {
            ok: true,
            item: Some(to_category_view(category)),
            error_code: None,
            message: "Category loaded.".to_string(),
        },
        Err(failure) => NamedDetailResponse {
            ok: false,
            item: None,
            error_code: Some(failure.code.to_string()),
            message: format!("catalog_get_category failed: {}", failure.message),
        },
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn catalog_list_types() -> NamedListResponse {
    let result = with_catalog_service(|service| {
        Ok(service
            .list_types()?
            .into_iter()
            .map(|kind| NamedItemView {
                id: kind.id,
                name: kind.name,
            })
            .collect::<Vec<_>>())
    });
    named_list_response("catalog_list_types", "type", result)
}

/// Creates a comic type. Types have no form; the name is taken verbatim
/// and trimmed by storage.
#[flutter_rust_bridge::frb(sync)]
pub fn catalog_create_type(name: String) -> CatalogActionResponse {
    match with_catalog_service(|service| Ok(service.create_type(&name)?.id)) {
        Ok(id) => CatalogActionResponse::success("Type created.", id),
        Err(failure) => CatalogActionResponse::failure("catalog_create_type", failure),
    }
}

/// Deletes a category; comics linked to it lose the link.
#[flutter_rust_bridge::frb(sync)]
pub fn catalog_delete_category(id: i64) -> CatalogActionResponse {
    match with_catalog_service(|service| service.delete_category(id).map_err(Failure::from)) {
        Ok(()) => CatalogActionResponse::success("Category deleted.", id),
        Err(failure) => CatalogActionResponse::failure("catalog_delete_category", failure),
    }
}

/// Opens a create form session of `kind` (`comic|author|category`).
///
/// Reference lists are loaded from storage and selection fields are seeded
/// with the first entry of their list.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Returns the new `session_id` and the seeded fields.
#[flutter_rust_bridge::frb(sync)]
pub fn form_open(kind: String) -> FormResponse {
    let kind = match FormKind::parse(&kind) {
        Ok(kind) => kind,
        Err(failure) => return FormResponse::failure(None, failure),
    };

    let opened = with_catalog_service(|service| {
        FormSession::mount(FormSynchronizer::new(kind.schema()), service).map_err(Failure::from)
    });
    match opened {
        Ok(session) => register_form(OpenForm {
            kind,
            target: None,
            session,
        }),
        Err(failure) => FormResponse::failure(None, failure),
    }
}

/// Opens an edit form session for the stored record `id` of `kind`.
///
/// Fields start from the record's values. A successful submit updates the
/// record in place and returns its unchanged id.
///
/// # FFI contract
/// - Returns `not_found` when no record has this id.
#[flutter_rust_bridge::frb(sync)]
pub fn form_open_edit(kind: String, id: i64) -> FormResponse {
    let kind = match FormKind::parse(&kind) {
        Ok(kind) => kind,
        Err(failure) => return FormResponse::failure(None, failure),
    };

    let opened = with_catalog_service(|service| {
        let synchronizer = FormSynchronizer::new(kind.schema());
        let session = match kind {
            FormKind::Comic => {
                let comic = service
                    .get_comic(id)?
                    .ok_or_else(|| record_not_found("comic", id))?;
                FormSession::mount_edit(synchronizer, service, &comic)?
            }
            FormKind::Author => {
                let author = service
                    .get_author(id)?
                    .ok_or_else(|| record_not_found("author", id))?;
                FormSession::mount_edit(synchronizer, service, &author)?
            }
            FormKind::Category => {
                let category = service
                    .get_category(id)?
                    .ok_or_else(|| record_not_found("category", id))?;
                FormSession::mount_edit(synchronizer, service, &category)?
            }
        };
        Ok(session)
    });
    match opened {
        Ok(session) => register_form(OpenForm {
            kind,
            target: Some(id),
            session,
        }),
        Err(failure) => FormResponse::failure(None, failure),
    }
}

/// Applies one raw control change to an open form.
///
/// `control_kind` is one of `text|single_choice|multi_choice`; `is_active`
/// is the checkbox state and only matters for `multi_choice`. A rejected
/// change keeps the previous state.
#[flutter_rust_bridge::frb(sync)]
pub fn form_apply_change(
    session_id: String,
    field: String,
    raw_value: String,
    control_kind: String,
    is_active: bool,
) -> FormResponse {
    with_open_form(&session_id, |form| {
        let changed = form
            .session
            .apply_tagged(&field, &raw_value, &control_kind, is_active)
            .map_err(Failure::from)?;
        let mut response = FormResponse::from_session(&session_id, &form.session);
        response.changed = changed;
        Ok(response)
    })
}

/// Submits an open form to storage.
///
/// Create forms insert a record, edit forms update theirs. On success the
/// session stays open in `submitted_success` and the record id is returned.
/// On failure the session returns to `editing` with its state kept.
#[flutter_rust_bridge::frb(sync)]
pub fn form_submit(session_id: String) -> FormResponse {
    let runtime = match submit_runtime() {
        Ok(runtime) => runtime,
        Err(failure) => return FormResponse::failure(Some(session_id), failure),
    };

    with_open_form(&session_id, |form| {
        let conn = open_catalog_db()?;
        let service = catalog_service(&conn)?;

        let kind = form.kind;
        let target = form.target;
        let session = &mut form.session;
        let result = runtime.block_on(async {
            match (kind, target) {
                (FormKind::Comic, None) => session
                    .submit(&service.comic_executor())
                    .await
                    .map(|comic| comic.id),
                (FormKind::Comic, Some(id)) => session
                    .submit(&service.comic_update_executor(id))
                    .await
                    .map(|comic| comic.id),
                (FormKind::Author, None) => session
                    .submit(&service.author_executor())
                    .await
                    .map(|author| author.id),
                (FormKind::Author, Some(id)) => session
                    .submit(&service.author_update_executor(id))
                    .await
                    .map(|author| author.id),
                (FormKind::Category, None) => session
                    .submit(&service.category_executor())
                    .await
                    .map(|category| category.id),
                (FormKind::Category, Some(id)) => session
                    .submit(&service.category_update_executor(id))
                    .await
                    .map(|category| category.id),
            }
        });

        match result {
            Ok(record_id) => {
                let mut response = FormResponse::from_session(&session_id, session);
                response.record_id = Some(record_id);
                response.message = "Form submitted.".to_string();
                Ok(response)
            }
            Err(err) => {
                let failure = Failure::from(err);
                warn!(
                    "event=form_submit module=ffi status=error form={} mode={} error_code={}",
                    kind.as_str(),
                    mode_str(session),
                    failure.code
                );
                let mut response = FormResponse::from_session(&session_id, session);
                response.ok = false;
                response.error_code = Some(failure.code.to_string());
                response.message = format!("form_submit failed: {}", failure.message);
                Ok(response)
            }
        }
    })
}

/// Re-fetches reference lists and re-seeds the form.
///
/// Create forms return to their seeded defaults, edit forms to the values
/// of the record they were opened with. Call after a related entity was
/// created inline, e.g. a new author.
#[flutter_rust_bridge::frb(sync)]
pub fn form_reset(session_id: String) -> FormResponse {
    with_open_form(&session_id, |form| {
        with_catalog_service(|service| form.session.refresh(service).map_err(Failure::from))?;
        Ok(FormResponse::from_session(&session_id, &form.session))
    })
}

/// Closes a form and drops its session.
#[flutter_rust_bridge::frb(sync)]
pub fn form_close(session_id: String) -> FormResponse {
    let removed = parse_session_id(&session_id)
        .and_then(|id| with_sessions(|sessions| Ok(sessions.remove(&id))));
    let slot = match removed {
        Ok(Some(slot)) => slot,
        Ok(None) => return FormResponse::failure(Some(session_id), session_not_found()),
        Err(failure) => return FormResponse::failure(Some(session_id), failure),
    };

    let response = match lock_form(&slot.form) {
        Ok(mut form) => {
            form.session.close();
            info!(
                "event=form_close module=ffi status=ok form={} session_id={session_id}",
                form.kind.as_str()
            );
            FormResponse::from_session(&session_id, &form.session)
        }
        Err(failure) => FormResponse::failure(Some(session_id), failure),
    };
    response
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormKind {
    Comic,
    Author,
    Category,
}

impl FormKind {
    fn parse(raw: &str) -> Result<Self, Failure> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "comic" => Ok(Self::Comic),
            "author" => Ok(Self::Author),
            "category" => Ok(Self::Category),
            other => Err(Failure::new(
                UNKNOWN_FORM_KIND,
                format!("unknown form kind `{other}`"),
            )),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Comic => "comic",
            Self::Author => "author",
            Self::Category => "category",
        }
    }

    fn schema(self) -> FormSchema {
        match self {
            Self::Comic => FormSchema::comic(),
            Self::Author => FormSchema::author(),
            Self::Category => FormSchema::category(),
        }
    }
}

struct OpenForm {
    kind: FormKind,
    /// Record being edited; `None` for create forms.
    target: Option<EntityId>,
    session: FormSession,
}

struct SessionSlot {
    form: Arc<Mutex<OpenForm>>,
    last_used: Instant,
}

/// Error code and message for envelope responses.
#[derive(Debug)]
struct Failure {
    code: Cow<'static, str>,
    message: String,
}

impl Failure {
    fn new(code: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<RepoError> for Failure {
    fn from(err: RepoError) -> Self {
        let code = match &err {
            RepoError::Validation(_) => VALIDATION_FAILED,
            RepoError::NotFound { .. } => NOT_FOUND,
            RepoError::Db(_) | RepoError::InvalidData(_) => STORAGE_ERROR,
        };
        Self::new(code, err.to_string())
    }
}

impl From<ChangeError> for Failure {
    fn from(err: ChangeError) -> Self {
        let code = match &err {
            ChangeError::Validation(_) => INVALID_CHANGE,
            ChangeError::Coercion(_) => COERCION_FAILED,
        };
        Self::new(code, err.to_string())
    }
}

impl From<SubmitError> for Failure {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Validation(err) => Self::new(VALIDATION_FAILED, err.to_string()),
            SubmitError::Mutation(err) => Self::new(err.code, err.message),
        }
    }
}

impl CatalogActionResponse {
    fn success(message: impl Into<String>, id: EntityId) -> Self {
        Self {
            ok: true,
            id: Some(id),
            error_code: None,
            message: message.into(),
        }
    }

    fn failure(operation: &str, failure: Failure) -> Self {
        Self {
            ok: false,
            id: None,
            error_code: Some(failure.code.to_string()),
            message: format!("{operation} failed: {}", failure.message),
        }
    }
}

impl FormResponse {
    fn from_session(session_id: &str, session: &FormSession) -> Self {
        Self {
            ok: true,
            session_id: Some(session_id.to_string()),
            phase: session.phase().as_str().to_string(),
            mode: mode_str(session).to_string(),
            fields: session
                .state()
                .iter()
                .map(|(field, value)| to_field_view(field, value))
                .collect(),
            changed: false,
            record_id: None,
            error_code: None,
            message: String::new(),
        }
    }

    fn failure(session_id: Option<String>, failure: Failure) -> Self {
        Self {
            ok: false,
            session_id,
            phase: String::new(),
            mode: String::new(),
            fields: Vec::new(),
            changed: false,
            record_id: None,
            error_code: Some(failure.code.to_string()),
            message: failure.message,
        }
    }
}

fn mode_str(session: &FormSession) -> &'static str {
    if session.is_edit() {
        "edit"
    } else {
        "create"
    }
}

fn named_list_response(
    operation: &str,
    noun: &str,
    result: Result<Vec<NamedItemView>, Failure>,
) -> NamedListResponse {
    match result {
        Ok(items) => NamedListResponse {
            ok: true,
            message: format!("Found {} {noun}(s).", items.len()),
            items,
            error_code: None,
        },
        Err(failure) => NamedListResponse {
            ok: false,
            items: Vec::new(),
            error_code: Some(failure.code.to_string()),
            message: format!("{operation} failed: {}", failure.message),
        },
    }
}

fn to_field_view(field: &str, value: &FieldValue) -> FormFieldView {
    let (shape, text, id, ids) = match value {
        FieldValue::Text(text) => ("text", Some(text.clone()), None, Vec::new()),
        FieldValue::Id(id) => ("id", None, *id, Vec::new()),
        FieldValue::IdSet(ids) => ("id_set", None, None, ids.iter().copied().collect()),
    };
    FormFieldView {
        field: field.to_string(),
        shape: shape.to_string(),
        text,
        id,
        ids,
    }
}

fn to_comic_detail(comic: ComicRecord) -> ComicDetailView {
    ComicDetailView {
        id: comic.id,
        name: comic.name,
        author_id: comic.author.id,
        type_id: comic.kind.id,
        category_ids: comic.categories.iter().map(|category| category.id).collect(),
    }
}

fn to_author_view(author: Author) -> AuthorView {
    AuthorView {
        id: author.id,
        name: author.name,
        gender: author.gender,
    }
}

fn to_category_view(category: Category) -> NamedItemView {
    NamedItemView {
        id: category.id,
        name: category.name,
    }
}

fn record_not_found(entity: &str, id: EntityId) -> Failure {
    Failure::new(NOT_FOUND, format!("{entity} not found: {id}"))
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

fn open_catalog_db() -> Result<Connection, Failure> {
    open_db(resolve_db_path())
        .map_err(|err| Failure::new(STORAGE_ERROR, format!("catalog DB open failed: {err}")))
}

fn catalog_service(
    conn: &Connection,
) -> Result<CatalogService<SqliteCatalogRepository<'_>>, Failure> {
    let repo = SqliteCatalogRepository::try_new(conn).map_err(|err| {
        Failure::new(STORAGE_ERROR, format!("catalog repo init failed: {err}"))
    })?;
    Ok(CatalogService::new(repo))
}

fn with_catalog_service<T>(
    f: impl FnOnce(&CatalogService<SqliteCatalogRepository<'_>>) -> Result<T, Failure>,
) -> Result<T, Failure> {
    let conn = open_catalog_db()?;
    let service = catalog_service(&conn)?;
    f(&service)
}

/// Current-thread runtime shared by every submit.
fn submit_runtime() -> Result<&'static Runtime, Failure> {
    SUBMIT_RUNTIME
        .get_or_try_init(|| tokio::runtime::Builder::new_current_thread().build())
        .map_err(|err| Failure::new(INTERNAL_ERROR, format!("runtime init failed: {err}")))
}

fn with_sessions<T>(
    f: impl FnOnce(&mut HashMap<Uuid, SessionSlot>) -> Result<T, Failure>,
) -> Result<T, Failure> {
    let registry = FORM_SESSIONS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut sessions = registry
        .lock()
        .map_err(|_| Failure::new(INTERNAL_ERROR, "form session registry poisoned"))?;
    f(&mut sessions)
}

fn register_form(form: OpenForm) -> FormResponse {
    let session_id = Uuid::new_v4();
    let response = FormResponse::from_session(&session_id.to_string(), &form.session);
    let kind = form.kind;
    let registered = with_sessions(|sessions| {
        let now = Instant::now();
        let evicted = evict_stale(sessions, now);
        sessions.insert(
            session_id,
            SessionSlot {
                form: Arc::new(Mutex::new(form)),
                last_used: now,
            },
        );
        Ok(evicted)
    });
    match registered {
        Ok(evicted) => {
            info!(
                "event=form_open module=ffi status=ok form={} mode={} session_id={session_id} evicted={evicted}",
                kind.as_str(),
                response.mode
            );
            response
        }
        Err(failure) => FormResponse::failure(None, failure),
    }
}

/// Drops idle sessions, then the least recently used ones until a new
/// session fits under `MAX_OPEN_SESSIONS`. Returns how many were dropped.
fn evict_stale(sessions: &mut HashMap<Uuid, SessionSlot>, now: Instant) -> usize {
    let before = sessions.len();
    sessions.retain(|_, slot| now.saturating_duration_since(slot.last_used) < SESSION_IDLE_TTL);
    while sessions.len() >= MAX_OPEN_SESSIONS {
        let oldest = sessions
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(id, _)| *id);
        match oldest {
            Some(id) => {
                sessions.remove(&id);
            }
            None => break,
        }
    }
    before - sessions.len()
}

/// Looks a session up and marks it used; the registry lock is released on
/// return.
fn checkout_form(id: Uuid) -> Result<Arc<Mutex<OpenForm>>, Failure> {
    with_sessions(|sessions| match sessions.get_mut(&id) {
        Some(slot) => {
            slot.last_used = Instant::now();
            Ok(Arc::clone(&slot.form))
        }
        None => Err(session_not_found()),
    })
}

fn lock_form(form: &Mutex<OpenForm>) -> Result<std::sync::MutexGuard<'_, OpenForm>, Failure> {
    form.lock()
        .map_err(|_| Failure::new(INTERNAL_ERROR, "form session poisoned"))
}

fn with_open_form(
    session_id: &str,
    f: impl FnOnce(&mut OpenForm) -> Result<FormResponse, Failure>,
) -> FormResponse {
    let result = parse_session_id(session_id)
        .and_then(checkout_form)
        .and_then(|form| {
            let mut guard = lock_form(&form)?;
            f(&mut guard)
        });
    result.unwrap_or_else(|failure| FormResponse::failure(Some(session_id.to_string()), failure))
}

fn parse_session_id(raw: &str) -> Result<Uuid, Failure> {
    Uuid::parse_str(raw.trim()).map_err(|_| session_not_found())
}

fn session_not_found() -> Failure {
    Failure::new(SESSION_NOT_FOUND, "form session not found")
}

#[cfg(test)]
mod tests {
    use super::{
        catalog_create_type, catalog_delete_category, catalog_get_author, catalog_get_category,
        catalog_get_comic, catalog_list_authors, catalog_list_categories, catalog_list_comics,
        catalog_list_types, core_version, evict_stale, form_apply_change, form_close, form_open,
        form_open_edit, form_reset, form_submit, init_logging, ping, Failure, FormKind,
        FormResponse, OpenForm, SessionSlot, MAX_OPEN_SESSIONS, SESSION_IDLE_TTL,
    };
    use comicdesk_core::{
        FormSession, FormSynchronizer, MutationError, ReferenceLists, SubmitError,
    };
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
    use uuid::Uuid;

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn create_type_appears_in_type_list() {
        let name = unique_token("type");
        let created = catalog_create_type(name.clone());
        assert!(created.ok, "{}", created.message);
        let type_id = created.id.expect("created type should return id");

        let listed = catalog_list_types();
        assert!(listed.ok, "{}", listed.message);
        assert!(listed
            .items
            .iter()
            .any(|item| item.id == type_id && item.name == name));
    }

    #[test]
    fn create_type_rejects_blank_name() {
        let response = catalog_create_type("   ".to_string());
        assert!(!response.ok);
        assert_eq!(response.error_code.as_deref(), Some("validation_failed"));
    }

    #[test]
    fn comic_form_flow_creates_comic_with_categories() {
        let author_name = unique_token("author");
        let author_id = submit_simple_form("author", &author_name);
        let category_id = submit_simple_form("category", &unique_token("category"));
        let type_id = catalog_create_type(unique_token("type"))
            .id
            .expect("type create should return id");

        let opened = form_open("comic".to_string());
        assert!(opened.ok, "{}", opened.message);
        assert_eq!(opened.phase, "mounted");
        assert_eq!(opened.mode, "create");
        let session_id = opened.session_id.clone().expect("session id");

        for (field, raw, control, active) in [
            ("name", unique_token("comic"), "text", false),
            ("author", author_id.to_string(), "single_choice", false),
            ("type", format!(" {type_id} "), "single_choice", false),
            ("categories", category_id.to_string(), "multi_choice", true),
        ] {
            let response = form_apply_change(
                session_id.clone(),
                field.to_string(),
                raw,
                control.to_string(),
                active,
            );
            assert!(response.ok, "{field}: {}", response.message);
        }

        let submitted = form_submit(session_id.clone());
        assert!(submitted.ok, "{}", submitted.message);
        assert_eq!(submitted.phase, "submitted_success");
        let comic_id = submitted.record_id.expect("submit should return id");

        let detail = catalog_get_comic(comic_id);
        assert!(detail.ok, "{}", detail.message);
        let comic = detail.comic.expect("comic detail");
        assert_eq!(comic.author_id, author_id);
        assert_eq!(comic.type_id, type_id);
        assert_eq!(comic.category_ids, vec![category_id]);

        let listed = catalog_list_comics();
        assert!(listed
            .items
            .iter()
            .any(|row| row.id == comic_id && row.author_name == author_name));

        let deleted = catalog_delete_category(category_id);
        assert!(deleted.ok, "{}", deleted.message);
        let detail = catalog_get_comic(comic_id).comic.expect("comic detail");
        assert!(detail.category_ids.is_empty());

        let closed = form_close(session_id.clone());
        assert_eq!(closed.phase, "closed");
        let after_close = form_submit(session_id);
        assert_eq!(after_close.error_code.as_deref(), Some("session_not_found"));
    }

    #[test]
    fn comic_edit_form_keeps_id_and_replaces_categories() {
        let author_id = submit_simple_form("author", &unique_token("author"));
        let first_category = submit_simple_form("category", &unique_token("category"));
        let second_category = submit_simple_form("category", &unique_token("category"));
        let type_id = catalog_create_type(unique_token("type"))
            .id
            .expect("type create should return id");

        let created = form_open("comic".to_string());
        let create_id = created.session_id.expect("session id");
        for (field, raw, control) in [
            ("name", "Draft title".to_string(), "text"),
            ("author", author_id.to_string(), "single_choice"),
            ("type", type_id.to_string(), "single_choice"),
            ("categories", first_category.to_string(), "multi_choice"),
        ] {
            let response = form_apply_change(
                create_id.clone(),
                field.to_string(),
                raw,
                control.to_string(),
                true,
            );
            assert!(response.ok, "{field}: {}", response.message);
        }
        let comic_id = form_submit(create_id.clone())
            .record_id
            .expect("create should return id");
        form_close(create_id);

        let opened = form_open_edit("comic".to_string(), comic_id);
        assert!(opened.ok, "{}", opened.message);
        assert_eq!(opened.mode, "edit");
        assert_eq!(field_text(&opened, "name"), Some("Draft title"));
        assert_eq!(field_ids(&opened, "categories"), vec![first_category]);
        let session_id = opened.session_id.clone().expect("session id");

        for (field, raw, active) in [
            ("categories", first_category.to_string(), false),
            ("categories", second_category.to_string(), true),
        ] {
            let response = form_apply_change(
                session_id.clone(),
                field.to_string(),
                raw,
                "multi_choice".to_string(),
                active,
            );
            assert!(response.ok, "{}", response.message);
        }
        let renamed = form_apply_change(
            session_id.clone(),
            "name".to_string(),
            "Final title".to_string(),
            "text".to_string(),
            false,
        );
        assert!(renamed.changed);

        let submitted = form_submit(session_id.clone());
        assert!(submitted.ok, "{}", submitted.message);
        assert_eq!(submitted.record_id, Some(comic_id));

        let comic = catalog_get_comic(comic_id).comic.expect("comic detail");
        assert_eq!(comic.name, "Final title");
        assert_eq!(comic.author_id, author_id);
        assert_eq!(comic.category_ids, vec![second_category]);
        assert_eq!(
            catalog_list_comics()
                .items
                .iter()
                .filter(|row| row.id == comic_id)
                .count(),
            1
        );
        form_close(session_id);
    }

    #[test]
    fn edit_form_reset_returns_to_stored_values() {
        let name = unique_token("author");
        let author_id = submit_simple_form("author", &name);

        let opened = form_open_edit("author".to_string(), author_id);
        assert!(opened.ok, "{}", opened.message);
        let session_id = opened.session_id.expect("session id");
        form_apply_change(
            session_id.clone(),
            "name".to_string(),
            "Scratch".to_string(),
            "text".to_string(),
            false,
        );

        let reset = form_reset(session_id.clone());
        assert!(reset.ok, "{}", reset.message);
        assert_eq!(reset.mode, "edit");
        assert_eq!(field_text(&reset, "name"), Some(name.as_str()));
        form_close(session_id);
    }

    #[test]
    fn edit_of_missing_record_is_not_found() {
        for kind in ["comic", "author", "category"] {
            let opened = form_open_edit(kind.to_string(), i64::MAX);
            assert!(!opened.ok);
            assert_eq!(opened.error_code.as_deref(), Some("not_found"), "{kind}");
            assert!(opened.session_id.is_none());
        }
    }

    #[test]
    fn author_and_category_details_load_or_report_not_found() {
        let author_name = unique_token("author");
        let author_id = submit_simple_form("author", &author_name);
        let category_name = unique_token("category");
        let category_id = submit_simple_form("category", &category_name);

        let author = catalog_get_author(author_id);
        assert!(author.ok, "{}", author.message);
        assert_eq!(author.author.expect("author").name, author_name);
        let category = catalog_get_category(category_id);
        assert!(category.ok, "{}", category.message);
        assert_eq!(category.item.expect("category").name, category_name);

        let missing_author = catalog_get_author(i64::MAX);
        assert!(!missing_author.ok && missing_author.author.is_none());
        assert_eq!(missing_author.error_code.as_deref(), Some("not_found"));
        let missing_category = catalog_get_category(i64::MAX);
        assert!(!missing_category.ok && missing_category.item.is_none());
        assert_eq!(missing_category.error_code.as_deref(), Some("not_found"));
    }

    #[test]
    fn rejected_change_reports_code_and_keeps_state() {
        let opened = form_open("comic".to_string());
        assert!(opened.ok, "{}", opened.message);
        let session_id = opened.session_id.clone().expect("session id");
        let named = form_apply_change(
            session_id.clone(),
            "name".to_string(),
            "Draft".to_string(),
            "text".to_string(),
            false,
        );
        assert!(named.changed);

        let bad_id = form_apply_change(
            session_id.clone(),
            "author".to_string(),
            "seven".to_string(),
            "single_choice".to_string(),
            false,
        );
        assert!(!bad_id.ok);
        assert_eq!(bad_id.error_code.as_deref(), Some("coercion_failed"));

        let bad_control = form_apply_change(
            session_id.clone(),
            "categories".to_string(),
            "1".to_string(),
            "radio".to_string(),
            true,
        );
        assert_eq!(bad_control.error_code.as_deref(), Some("invalid_change"));

        assert!(!bad_control.ok);
        let kept = form_apply_change(
            session_id.clone(),
            "name".to_string(),
            "Draft".to_string(),
            "text".to_string(),
            false,
        );
        assert!(kept.ok && !kept.changed);

        let reset = form_reset(session_id.clone());
        assert!(reset.ok, "{}", reset.message);
        assert_eq!(reset.phase, "mounted");
        assert_eq!(field_text(&reset, "name"), Some(""));
        form_close(session_id);
    }

    #[test]
    fn toggle_reports_changed_only_when_state_moves() {
        let category_id = submit_simple_form("category", &unique_token("category"));
        let opened = form_open("comic".to_string());
        let session_id = opened.session_id.expect("session id");

        let toggle = |active: bool| {
            form_apply_change(
                session_id.clone(),
                "categories".to_string(),
                category_id.to_string(),
                "multi_choice".to_string(),
                active,
            )
        };

        assert!(toggle(true).changed);
        let again = toggle(true);
        assert!(again.ok && !again.changed);
        let categories = again
            .fields
            .iter()
            .find(|field| field.field == "categories")
            .expect("categories field");
        assert_eq!(categories.shape, "id_set");
        assert_eq!(categories.ids, vec![category_id]);
        assert!(toggle(false).changed);
        form_close(session_id);
    }

    #[test]
    fn strict_submit_rejects_blank_required_name() {
        let opened = form_open("category".to_string());
        let session_id = opened.session_id.expect("session id");

        let submitted = form_submit(session_id.clone());
        assert!(!submitted.ok);
        assert_eq!(submitted.error_code.as_deref(), Some("validation_failed"));
        assert_eq!(submitted.phase, "editing");
        form_close(session_id);
    }

    #[test]
    fn author_form_result_is_listed() {
        let name = unique_token("author");
        let author_id = submit_simple_form("author", &name);

        let authors = catalog_list_authors();
        assert!(authors
            .items
            .iter()
            .any(|author| author.id == author_id && author.name == name && author.gender.is_none()));
        assert!(catalog_list_categories().ok);
    }

    #[test]
    fn unknown_kind_and_session_are_reported() {
        let opened = form_open("publisher".to_string());
        assert!(!opened.ok);
        assert_eq!(opened.error_code.as_deref(), Some("unknown_form_kind"));
        let edit = form_open_edit("publisher".to_string(), 1);
        assert_eq!(edit.error_code.as_deref(), Some("unknown_form_kind"));

        let closed = form_close("not-a-uuid".to_string());
        assert_eq!(closed.error_code.as_deref(), Some("session_not_found"));
        let missing = form_reset(Uuid::new_v4().to_string());
        assert_eq!(missing.error_code.as_deref(), Some("session_not_found"));
    }

    #[test]
    fn executor_codes_pass_through_unchanged() {
        let failure = Failure::from(SubmitError::Mutation(MutationError::new(
            "quota_exceeded",
            "daily limit reached",
        )));
        assert_eq!(failure.code, "quota_exceeded");
        assert_eq!(failure.message, "daily limit reached");

        let known = Failure::from(SubmitError::Mutation(MutationError::new("not_found", "gone")));
        assert_eq!(known.code, "not_found");
    }

    #[test]
    fn idle_and_surplus_sessions_are_evicted() {
        let opened_at = Instant::now();
        let mut sessions = HashMap::new();
        let idle = Uuid::new_v4();
        sessions.insert(idle, slot(opened_at));
        let fresh = Uuid::new_v4();
        let later = opened_at + SESSION_IDLE_TTL;
        sessions.insert(fresh, slot(later));

        let evicted = evict_stale(&mut sessions, later + Duration::from_secs(1));
        assert_eq!(evicted, 1);
        assert!(sessions.contains_key(&fresh) && !sessions.contains_key(&idle));

        let mut full = HashMap::new();
        let oldest = Uuid::new_v4();
        full.insert(oldest, slot(opened_at));
        for offset in 1..MAX_OPEN_SESSIONS as u64 {
            full.insert(Uuid::new_v4(), slot(opened_at + Duration::from_secs(offset)));
        }
        let evicted = evict_stale(&mut full, opened_at + Duration::from_secs(120));
        assert_eq!(evicted, 1);
        assert_eq!(full.len(), MAX_OPEN_SESSIONS - 1);
        assert!(!full.contains_key(&oldest));
    }

    fn slot(last_used: Instant) -> SessionSlot {
        let session = FormSession::with_lists(
            FormSynchronizer::new(FormKind::Category.schema()),
            ReferenceLists::default(),
        );
        SessionSlot {
            form: Arc::new(Mutex::new(OpenForm {
                kind: FormKind::Category,
                target: None,
                session,
            })),
            last_used,
        }
    }

    fn field_text<'a>(response: &'a FormResponse, name: &str) -> Option<&'a str> {
        response
            .fields
            .iter()
            .find(|field| field.field == name)
            .and_then(|field| field.text.as_deref())
    }

    fn field_ids(response: &FormResponse, name: &str) -> Vec<i64> {
        response
            .fields
            .iter()
            .find(|field| field.field == name)
            .map(|field| field.ids.clone())
            .unwrap_or_default()
    }

    fn submit_simple_form(kind: &str, name: &str) -> i64 {
        let opened = form_open(kind.to_string());
        assert!(opened.ok, "{}", opened.message);
        let session_id = opened.session_id.clone().expect("session id");
        let changed: FormResponse = form_apply_change(
            session_id.clone(),
            "name".to_string(),
            name.to_string(),
            "text".to_string(),
            false,
        );
        assert!(changed.ok, "{}", changed.message);
        let submitted = form_submit(session_id.clone());
        assert!(submitted.ok, "{}", submitted.message);
        form_close(session_id);
        submitted.record_id.expect("submit should return id")
    }

    fn unique_token(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        format!("{prefix}-{nanos}")
    }
}
