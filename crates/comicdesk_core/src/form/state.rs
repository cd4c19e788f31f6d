//! Normalized form state and change events.
//!
//! # Invariants
//! - `FormState` values are replaced, never edited in place, by the
//!   synchronizer. Every accepted change yields a new `FormState`.
//! - Identifier values are integers; raw strings never reach this type.

use crate::form::field::ControlKind;
use crate::form::payload::{FormPayload, PayloadValue};
use crate::model::catalog::EntityId;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Value held by one form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    /// Scalar identifier; `None` when nothing is selected yet.
    Id(Option<EntityId>),
    IdSet(BTreeSet<EntityId>),
}

/// Current values of every declared field of one form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormState {
    values: BTreeMap<String, FieldValue>,
}

impl FormState {
    pub(crate) fn from_values(values: BTreeMap<String, FieldValue>) -> Self {
        Self { values }
    }

    /// Returns a copy of this state with one field replaced.
    pub(crate) fn with_value(&self, field: &str, value: FieldValue) -> Self {
        let mut values = self.values.clone();
        values.insert(field.to_string(), value);
        Self { values }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    /// Text of a text field; `None` for unknown or non-text fields.
    pub fn text(&self, field: &str) -> Option<&str> {
        match self.values.get(field) {
            Some(FieldValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Selected id of a scalar id field; `None` when unset or not an id field.
    pub fn id(&self, field: &str) -> Option<EntityId> {
        match self.values.get(field) {
            Some(FieldValue::Id(value)) => *value,
            _ => None,
        }
    }

    pub fn ids(&self, field: &str) -> Option<&BTreeSet<EntityId>> {
        match self.values.get(field) {
            Some(FieldValue::IdSet(values)) => Some(values),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Converts the state into the executor payload shape.
    ///
    /// Sets become ascending sequences; unset ids stay `None`.
    pub fn to_payload(&self) -> FormPayload {
        let fields = self
            .values
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    FieldValue::Text(text) => PayloadValue::Text(text.clone()),
                    FieldValue::Id(id) => PayloadValue::Id(*id),
                    FieldValue::IdSet(ids) => PayloadValue::Ids(ids.iter().copied().collect()),
                };
                (name.clone(), value)
            })
            .collect();
        FormPayload::from_fields(fields)
    }
}

/// One raw change reported by a bound control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub field: String,
    /// Control value as the widget carries it.
    pub raw_value: String,
    pub control: ControlKind,
    /// Checkbox state after the click; ignored unless `MultiChoice`.
    pub is_active: bool,
}

impl ChangeEvent {
    pub fn text(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            raw_value: value.into(),
            control: ControlKind::Text,
            is_active: false,
        }
    }

    pub fn select(field: impl Into<String>, raw_id: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            raw_value: raw_id.into(),
            control: ControlKind::SingleChoice,
            is_active: false,
        }
    }

    pub fn toggle(field: impl Into<String>, raw_id: impl Into<String>, is_active: bool) -> Self {
        Self {
            field: field.into(),
            raw_value: raw_id.into(),
            control: ControlKind::MultiChoice,
            is_active,
        }
    }
}
