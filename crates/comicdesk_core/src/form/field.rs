//! Control kinds, field descriptors and form schemas.
//!
//! # Responsibility
//! - Declare the closed set of control kinds a presentation layer may tag
//!   change events with.
//! - Declare per-field arity and coercion rules.
//!
//! # Invariants
//! - A field's arity never changes for the lifetime of a form.
//! - Multi-valued fields always hold integer identifiers.

use crate::form::error::ValidationError;
use crate::model::catalog::ReferenceKind;
use serde::Serialize;
use std::collections::HashSet;
use std::str::FromStr;

/// Semantic category of the input widget that produced a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    /// Free text input. Value stored verbatim.
    Text,
    /// Dropdown or radio group. Value is one identifier.
    SingleChoice,
    /// Checkbox group. Value toggles one identifier in a set.
    MultiChoice,
}

impl ControlKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::SingleChoice => "single_choice",
            Self::MultiChoice => "multi_choice",
        }
    }
}

impl FromStr for ControlKind {
    type Err = ValidationError;

    /// Accepts `snake_case` and `kebab-case` tags, case-insensitive.
    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "text" => Ok(Self::Text),
            "single_choice" => Ok(Self::SingleChoice),
            "multi_choice" => Ok(Self::MultiChoice),
            _ => Err(ValidationError::UnknownControlKind(tag.to_string())),
        }
    }
}

/// Number of values a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldArity {
    Scalar,
    Multi,
}

/// How raw control strings are converted before storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Coercion {
    Text,
    IntegerId,
}

/// Declaration of one form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub arity: FieldArity,
    pub coercion: Coercion,
    /// Checked by strict submit: non-blank text, set id.
    pub required: bool,
    /// Reference list whose first entry seeds a scalar id field.
    pub seed: Option<ReferenceKind>,
}

impl FieldDescriptor {
    pub fn text(name: &'static str) -> Self {
        Self {
            name,
            arity: FieldArity::Scalar,
            coercion: Coercion::Text,
            required: false,
            seed: None,
        }
    }

    pub fn single_id(name: &'static str) -> Self {
        Self {
            name,
            arity: FieldArity::Scalar,
            coercion: Coercion::IntegerId,
            required: false,
            seed: None,
        }
    }

    pub fn id_set(name: &'static str) -> Self {
        Self {
            name,
            arity: FieldArity::Multi,
            coercion: Coercion::IntegerId,
            required: false,
            seed: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn seeded_from(mut self, kind: ReferenceKind) -> Self {
        self.seed = Some(kind);
        self
    }

    /// Returns the only control kind allowed to update this field.
    pub fn control_kind(&self) -> ControlKind {
        match (self.arity, self.coercion) {
            (FieldArity::Scalar, Coercion::Text) => ControlKind::Text,
            (FieldArity::Scalar, Coercion::IntegerId) => ControlKind::SingleChoice,
            (FieldArity::Multi, _) => ControlKind::MultiChoice,
        }
    }

    pub fn accepts(&self, control: ControlKind) -> bool {
        self.control_kind() == control
    }
}

/// Ordered, validated set of field descriptors for one form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSchema {
    name: &'static str,
    fields: Vec<FieldDescriptor>,
}

impl FormSchema {
    /// Builds a schema.
    ///
    /// # Errors
    /// - `DuplicateField` when two descriptors share a name.
    /// - `UnsupportedDescriptor` for a multi-valued text field.
    pub fn new(
        name: &'static str,
        fields: Vec<FieldDescriptor>,
    ) -> Result<Self, ValidationError> {
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name) {
                return Err(ValidationError::DuplicateField(field.name));
            }
            if field.arity == FieldArity::Multi && field.coercion == Coercion::Text {
                return Err(ValidationError::UnsupportedDescriptor(field.name));
            }
        }
        Ok(Self { name, fields })
    }

    /// Comic create/edit form.
    pub fn comic() -> Self {
        Self {
            name: "comic",
            fields: vec![
                FieldDescriptor::text("name").required(),
                FieldDescriptor::single_id("author")
                    .required()
                    .seeded_from(ReferenceKind::Authors),
                FieldDescriptor::single_id("type")
                    .required()
                    .seeded_from(ReferenceKind::Types),
                FieldDescriptor::id_set("categories"),
            ],
        }
    }

    /// Author form, also used inline from the comic form.
    pub fn author() -> Self {
        Self {
            name: "author",
            fields: vec![
                FieldDescriptor::text("name").required(),
                FieldDescriptor::text("gender"),
            ],
        }
    }

    pub fn category() -> Self {
        Self {
            name: "category",
            fields: vec![FieldDescriptor::text("name").required()],
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn descriptor(&self, field: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|descriptor| descriptor.name == field)
    }
}
