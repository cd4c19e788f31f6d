//! Catalog domain model.
//!
//! # Responsibility
//! - Define the records shown by list/detail pages (comics, authors,
//!   categories, types).
//! - Define reference lists used to populate form selection controls.
//!
//! # Invariants
//! - Identifiers inside the core are always `EntityId` integers.
//! - Raw identifiers from remote providers are coerced once, when a
//!   `ReferenceLists` value is built from `CatalogEntry` lists.

use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Relational identifier of a catalog entity.
pub type EntityId = i64;

/// Comic author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: EntityId,
    pub name: String,
    pub gender: Option<String>,
}

/// Comic category (genre-like tag, many per comic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: EntityId,
    pub name: String,
}

/// Comic publication type (exactly one per comic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComicType {
    pub id: EntityId,
    pub name: String,
}

/// Row shown on the comics list page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComicListItem {
    pub id: EntityId,
    pub name: String,
    /// Display name of the comic author.
    pub author_name: String,
}

/// Reference to a related entity by id only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: EntityId,
}

/// Comic record as returned by creation and detail queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComicRecord {
    pub id: EntityId,
    pub name: String,
    pub author: EntityRef,
    /// Sorted by id ascending.
    pub categories: Vec<EntityRef>,
    /// Serialized as `type` to match the external schema.
    #[serde(rename = "type")]
    pub kind: EntityRef,
}

/// Validated input for comic creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComicDraft {
    pub name: String,
    pub author_id: EntityId,
    pub type_id: EntityId,
    pub category_ids: Vec<EntityId>,
}

impl ComicDraft {
    /// Checks draft-level invariants before persistence.
    pub fn validate(&self) -> Result<(), CatalogValidationError> {
        validate_name(&self.name)
    }
}

/// Validation failures for catalog writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogValidationError {
    /// Display name is blank after trim.
    BlankName,
}

impl Display for CatalogValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "name must not be blank"),
        }
    }
}

impl Error for CatalogValidationError {}

/// Rejects names that are empty after trimming.
pub fn validate_name(name: &str) -> Result<(), CatalogValidationError> {
    if name.trim().is_empty() {
        return Err(CatalogValidationError::BlankName);
    }
    Ok(())
}

/// Raw reference entry as delivered by a remote catalog API.
///
/// GraphQL `ID` values are strings on the wire, but numeric ids are accepted
/// too; the value is kept verbatim until coerced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(deserialize_with = "deserialize_raw_id")]
    pub id: String,
    pub name: String,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Coerces the raw id into a typed option.
    pub fn to_option(&self) -> Result<ReferenceOption, CoercionError> {
        Ok(ReferenceOption {
            id: parse_entity_id(&self.id)?,
            label: self.name.clone(),
        })
    }
}

fn deserialize_raw_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(value) => value,
        RawId::Number(value) => value.to_string(),
    })
}

/// A raw identifier string could not be parsed to an integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionError {
    /// Field or list the value was destined for, when known.
    pub field: Option<String>,
    /// Offending raw value.
    pub raw: String,
}

impl CoercionError {
    pub(crate) fn for_field(field: &str, raw: &str) -> Self {
        Self {
            field: Some(field.to_string()),
            raw: raw.to_string(),
        }
    }
}

impl Display for CoercionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(
                f,
                "value `{}` for field `{field}` is not an integer identifier",
                self.raw
            ),
            None => write!(f, "value `{}` is not an integer identifier", self.raw),
        }
    }
}

impl Error for CoercionError {}

/// Parses a raw identifier string.
///
/// Surrounding whitespace is ignored; anything else that is not a plain
/// base-10 integer is rejected.
pub fn parse_entity_id(raw: &str) -> Result<EntityId, CoercionError> {
    raw.trim().parse::<EntityId>().map_err(|_| CoercionError {
        field: None,
        raw: raw.to_string(),
    })
}

/// Selectable choice in a reference list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceOption {
    pub id: EntityId,
    pub label: String,
}

/// Names one of the reference lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Authors,
    Categories,
    Types,
}

/// Reference lists available when a form mounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceLists {
    pub authors: Vec<ReferenceOption>,
    pub categories: Vec<ReferenceOption>,
    pub types: Vec<ReferenceOption>,
}

impl ReferenceLists {
    /// Builds typed lists from raw provider entries.
    ///
    /// Fails on the first entry whose id is not an integer; the error names
    /// the list it came from.
    pub fn from_entries(
        authors: &[CatalogEntry],
        categories: &[CatalogEntry],
        types: &[CatalogEntry],
    ) -> Result<Self, CoercionError> {
        Ok(Self {
            authors: coerce_entries(authors, "authors")?,
            categories: coerce_entries(categories, "categories")?,
            types: coerce_entries(types, "types")?,
        })
    }

    pub fn list(&self, kind: ReferenceKind) -> &[ReferenceOption] {
        match kind {
            ReferenceKind::Authors => &self.authors,
            ReferenceKind::Categories => &self.categories,
            ReferenceKind::Types => &self.types,
        }
    }

    /// Id of the first option in `kind`, used as a default selection.
    pub fn first_id(&self, kind: ReferenceKind) -> Option<EntityId> {
        self.list(kind).first().map(|option| option.id)
    }
}

fn coerce_entries(
    entries: &[CatalogEntry],
    list_name: &str,
) -> Result<Vec<ReferenceOption>, CoercionError> {
    entries
        .iter()
        .map(|entry| {
            entry
                .to_option()
                .map_err(|_| CoercionError::for_field(list_name, &entry.id))
        })
        .collect()
}
