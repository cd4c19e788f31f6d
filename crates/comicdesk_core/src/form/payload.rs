//! Normalized mutation payload.
//!
//! Serializes to the variables object of a relational mutation, e.g.
//! `{"author":7,"categories":[2,5],"name":"X","type":3}`.

use crate::form::error::MutationError;
use crate::model::catalog::EntityId;
use serde::Serialize;
use std::collections::BTreeMap;

pub const INVALID_PAYLOAD: &str = "invalid_payload";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Text(String),
    Id(Option<EntityId>),
    /// Ascending, unique.
    Ids(Vec<EntityId>),
}

/// Field values handed to a `MutationExecutor`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormPayload {
    fields: BTreeMap<String, PayloadValue>,
}

impl FormPayload {
    pub(crate) fn from_fields(fields: BTreeMap<String, PayloadValue>) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&PayloadValue> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Reads a text value, failing with `invalid_payload` otherwise.
    pub fn require_text(&self, field: &str) -> Result<&str, MutationError> {
        match self.fields.get(field) {
            Some(PayloadValue::Text(value)) => Ok(value.as_str()),
            _ => Err(missing(field, "text")),
        }
    }

    /// Reads an optional text value; blank text reads as `None`.
    pub fn optional_text(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(PayloadValue::Text(value)) if !value.trim().is_empty() => Some(value.as_str()),
            _ => None,
        }
    }

    /// Reads a set scalar id, failing with `invalid_payload` when unset.
    pub fn require_id(&self, field: &str) -> Result<EntityId, MutationError> {
        match self.fields.get(field) {
            Some(PayloadValue::Id(Some(id))) => Ok(*id),
            _ => Err(missing(field, "integer id")),
        }
    }

    /// Reads an id sequence; an absent field reads as empty.
    pub fn ids(&self, field: &str) -> Result<&[EntityId], MutationError> {
        match self.fields.get(field) {
            Some(PayloadValue::Ids(ids)) => Ok(ids.as_slice()),
            None => Ok(&[]),
            Some(_) => Err(missing(field, "id sequence")),
        }
    }
}

fn missing(field: &str, expected: &str) -> MutationError {
    MutationError::new(
        INVALID_PAYLOAD,
        format!("payload field `{field}` must hold a {expected}"),
    )
}
