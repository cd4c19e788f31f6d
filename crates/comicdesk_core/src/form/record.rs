//! Stored records as the starting point of edit forms.
//!
//! # Invariants
//! - A record only supplies values; the form schema still decides which
//!   fields exist and what shape each one has.

use crate::form::state::FieldValue;
use crate::model::catalog::{Author, Category, ComicRecord};

/// Record that can pre-fill a form opened for editing.
pub trait FormRecord {
    /// Stored value of `field`, or `None` when the record has no such field.
    fn field_value(&self, field: &str) -> Option<FieldValue>;
}

impl FormRecord for ComicRecord {
    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "name" => Some(FieldValue::Text(self.name.clone())),
            "author" => Some(FieldValue::Id(Some(self.author.id))),
            "type" => Some(FieldValue::Id(Some(self.kind.id))),
            "categories" => Some(FieldValue::IdSet(
                self.categories.iter().map(|category| category.id).collect(),
            )),
            _ => None,
        }
    }
}

impl FormRecord for Author {
    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "name" => Some(FieldValue::Text(self.name.clone())),
            "gender" => Some(FieldValue::Text(self.gender.clone().unwrap_or_default())),
            _ => None,
        }
    }
}

impl FormRecord for Category {
    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "name" => Some(FieldValue::Text(self.name.clone())),
            _ => None,
        }
    }
}
