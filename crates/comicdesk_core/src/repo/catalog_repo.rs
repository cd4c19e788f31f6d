//! Catalog repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over authors, categories, types and comics.
//! - Keep SQL details inside the storage boundary.
//!
//! # Invariants
//! - Write paths validate names before SQL mutations.
//! - Comic creation and update write the comic row and its category links in
//!   one transaction; referenced author/type/category rows must exist.
//! - An update replaces the whole category link set of the comic.
//! - Lists are ordered by `id ASC`.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::catalog::{
    validate_name, Author, CatalogValidationError, Category, ComicDraft, ComicListItem,
    ComicRecord, ComicType, EntityId, EntityRef,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for catalog persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(CatalogValidationError),
    Db(DbError),
    NotFound { entity: &'static str, id: EntityId },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted catalog data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<CatalogValidationError> for RepoError {
    fn from(value: CatalogValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for catalog operations.
pub trait CatalogRepository {
    fn list_authors(&self) -> RepoResult<Vec<Author>>;
    fn get_author(&self, id: EntityId) -> RepoResult<Option<Author>>;
    fn create_author(&self, name: &str, gender: Option<&str>) -> RepoResult<EntityId>;
    fn update_author(&self, id: EntityId, name: &str, gender: Option<&str>) -> RepoResult<()>;
    fn list_categories(&self) -> RepoResult<Vec<Category>>;
    fn get_category(&self, id: EntityId) -> RepoResult<Option<Category>>;
    fn create_category(&self, name: &str) -> RepoResult<EntityId>;
    fn update_category(&self, id: EntityId, name: &str) -> RepoResult<()>;
    /// Deletes a category and its comic links.
    fn delete_category(&self, id: EntityId) -> RepoResult<()>;
    fn list_types(&self) -> RepoResult<Vec<ComicType>>;
    fn create_type(&self, name: &str) -> RepoResult<EntityId>;
    fn list_comics(&self) -> RepoResult<Vec<ComicListItem>>;
    fn get_comic(&self, id: EntityId) -> RepoResult<Option<ComicRecord>>;
    fn create_comic(&self, draft: &ComicDraft) -> RepoResult<EntityId>;
    /// Rewrites name, author and type, and replaces the category links.
    fn update_comic(&self, id: EntityId, draft: &ComicDraft) -> RepoResult<()>;
}

/// SQLite-backed catalog repository.
pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    ///
    /// Rejects connections whose schema version differs from the latest
    /// migration known by this binary.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let db_version = current_user_version(conn)?;
        let expected = latest_version();
        if db_version > expected {
            return Err(DbError::UnsupportedSchemaVersion {
                db_version,
                latest_supported: expected,
            }
            .into());
        }
        if db_version < expected {
            return Err(DbError::SchemaNotMigrated {
                db_version,
                expected,
            }
            .into());
        }
        Ok(Self { conn })
    }
}

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn list_authors(&self) -> RepoResult<Vec<Author>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, gender FROM authors ORDER BY id ASC;")?;
        let authors = stmt
            .query_map([], |row| {
                Ok(Author {
                    id: row.get("id")?,
                    name: row.get("name")?,
                    gender: row.get("gender")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(authors)
    }

    fn get_author(&self, id: EntityId) -> RepoResult<Option<Author>> {
        let author = self
            .conn
            .query_row(
                "SELECT id, name, gender FROM authors WHERE id = ?1;",
                [id],
                |row| {
                    Ok(Author {
                        id: row.get("id")?,
                        name: row.get("name")?,
                        gender: row.get("gender")?,
                    })
                },
            )
            .optional()?;
        Ok(author)
    }

    fn create_author(&self, name: &str, gender: Option<&str>) -> RepoResult<EntityId> {
        validate_name(name)?;
        let gender = gender.map(str::trim).filter(|value| !value.is_empty());
        self.conn.execute(
            "INSERT INTO authors (name, gender) VALUES (?1, ?2);",
            params![name.trim(), gender],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_author(&self, id: EntityId, name: &str, gender: Option<&str>) -> RepoResult<()> {
        validate_name(name)?;
        let gender = gender.map(str::trim).filter(|value| !value.is_empty());
        let changed = self.conn.execute(
            "UPDATE authors SET name = ?2, gender = ?3 WHERE id = ?1;",
            params![id, name.trim(), gender],
        )?;
        expect_one_row(changed, "author", id)
    }

    fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM categories ORDER BY id ASC;")?;
        let categories = stmt
            .query_map([], |row| {
                Ok(Category {
                    id: row.get("id")?,
                    name: row.get("name")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    fn get_category(&self, id: EntityId) -> RepoResult<Option<Category>> {
        let category = self
            .conn
            .query_row(
                "SELECT id, name FROM categories WHERE id = ?1;",
                [id],
                |row| {
                    Ok(Category {
                        id: row.get("id")?,
                        name: row.get("name")?,
                    })
                },
            )
            .optional()?;
        Ok(category)
    }

    fn create_category(&self, name: &str) -> RepoResult<EntityId> {
        validate_name(name)?;
        self.conn.execute(
            "INSERT INTO categories (name) VALUES (?1);",
            [name.trim()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_category(&self, id: EntityId, name: &str) -> RepoResult<()> {
        validate_name(name)?;
        let changed = self.conn.execute(
            "UPDATE categories SET name = ?2 WHERE id = ?1;",
            params![id, name.trim()],
        )?;
        expect_one_row(changed, "category", id)
    }

    fn delete_category(&self, id: EntityId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM categories WHERE id = ?1;", [id])?;
        expect_one_row(changed, "category", id)
    }

    fn list_types(&self) -> RepoResult<Vec<ComicType>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM comic_types ORDER BY id ASC;")?;
        let types = stmt
            .query_map([], |row| {
                Ok(ComicType {
                    id: row.get("id")?,
                    name: row.get("name")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(types)
    }

    fn create_type(&self, name: &str) -> RepoResult<EntityId> {
        validate_name(name)?;
        self.conn.execute(
            "INSERT INTO comic_types (name) VALUES (?1);",
            [name.trim()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_comics(&self) -> RepoResult<Vec<ComicListItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                c.id AS id,
                c.name AS name,
                a.name AS author_name
             FROM comics c
             JOIN authors a ON a.id = c.author_id
             ORDER BY c.id ASC;",
        )?;
        let comics = stmt
            .query_map([], |row| {
                Ok(ComicListItem {
                    id: row.get("id")?,
                    name: row.get("name")?,
                    author_name: row.get("author_name")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comics)
    }

    fn get_comic(&self, id: EntityId) -> RepoResult<Option<ComicRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, author_id, type_id FROM comics WHERE id = ?1;",
                [id],
                |row| {
                    Ok((
                        row.get::<_, EntityId>("id")?,
                        row.get::<_, String>("name")?,
                        row.get::<_, EntityId>("author_id")?,
                        row.get::<_, EntityId>("type_id")?,
                    ))
                },
            )
            .optional()?;

        let Some((comic_id, name, author_id, type_id)) = row else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT category_id
             FROM comic_categories
             WHERE comic_id = ?1
             ORDER BY category_id ASC;",
        )?;
        let categories = stmt
            .query_map([comic_id], |row| {
                Ok(EntityRef {
                    id: row.get("category_id")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(ComicRecord {
            id: comic_id,
            name,
            author: EntityRef { id: author_id },
            categories,
            kind: EntityRef { id: type_id },
        }))
    }

    fn create_comic(&self, draft: &ComicDraft) -> RepoResult<EntityId> {
        draft.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        let category_ids = ensure_references(&tx, draft)?;

        tx.execute(
            "INSERT INTO comics (name, author_id, type_id) VALUES (?1, ?2, ?3);",
            params![draft.name.trim(), draft.author_id, draft.type_id],
        )?;
        let comic_id = tx.last_insert_rowid();
        link_categories(&tx, comic_id, &category_ids)?;
        tx.commit()?;

        Ok(comic_id)
    }

    fn update_comic(&self, id: EntityId, draft: &ComicDraft) -> RepoResult<()> {
        draft.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        ensure_exists(&tx, "comics", "comic", id)?;
        let category_ids = ensure_references(&tx, draft)?;

        tx.execute(
            "UPDATE comics SET name = ?2, author_id = ?3, type_id = ?4 WHERE id = ?1;",
            params![id, draft.name.trim(), draft.author_id, draft.type_id],
        )?;
        tx.execute("DELETE FROM comic_categories WHERE comic_id = ?1;", [id])?;
        link_categories(&tx, id, &category_ids)?;
        tx.commit()?;

        Ok(())
    }
}

/// Checks the draft's author, type and categories; returns the deduplicated
/// category ids.
fn ensure_references(conn: &Connection, draft: &ComicDraft) -> RepoResult<BTreeSet<EntityId>> {
    ensure_exists(conn, "authors", "author", draft.author_id)?;
    ensure_exists(conn, "comic_types", "type", draft.type_id)?;
    let category_ids = draft.category_ids.iter().copied().collect::<BTreeSet<_>>();
    for category_id in &category_ids {
        ensure_exists(conn, "categories", "category", *category_id)?;
    }
    Ok(category_ids)
}

fn link_categories(
    conn: &Connection,
    comic_id: EntityId,
    category_ids: &BTreeSet<EntityId>,
) -> RepoResult<()> {
    let mut link =
        conn.prepare("INSERT INTO comic_categories (comic_id, category_id) VALUES (?1, ?2);")?;
    for category_id in category_ids {
        link.execute(params![comic_id, category_id])?;
    }
    Ok(())
}

fn expect_one_row(changed: usize, entity: &'static str, id: EntityId) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound { entity, id });
    }
    Ok(())
}

fn ensure_exists(
    conn: &Connection,
    table: &'static str,
    entity: &'static str,
    id: EntityId,
) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1);"),
        [id],
        |row| row.get(0),
    )?;
    match exists {
        1 => Ok(()),
        0 => Err(RepoError::NotFound { entity, id }),
        other => Err(RepoError::InvalidData(format!(
            "unexpected EXISTS result `{other}` for {table}"
        ))),
    }
}
