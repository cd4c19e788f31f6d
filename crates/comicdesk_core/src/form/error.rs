//! Error types for form changes and submits.

use crate::form::field::{ControlKind, FieldDescriptor};
use crate::form::session::FormPhase;
use crate::model::catalog::CoercionError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Mismatch between the presentation layer and the form's declared fields,
/// or a submit-time required-value failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field name is not declared by the form schema.
    UnknownField(String),
    /// Control kind tag string is not one of the known kinds.
    UnknownControlKind(String),
    /// Control kind cannot drive the field's arity/coercion.
    ControlKindMismatch {
        field: String,
        control: ControlKind,
    },
    /// Schema declares the same field name twice.
    DuplicateField(&'static str),
    /// Schema declares a multi-valued text field.
    UnsupportedDescriptor(&'static str),
    /// Required value is blank or unset.
    MissingRequired(&'static str),
    /// Form session no longer accepts this operation.
    NotEditable(FormPhase),
}

impl ValidationError {
    pub(crate) fn mismatch(descriptor: &FieldDescriptor, control: ControlKind) -> Self {
        Self::ControlKindMismatch {
            field: descriptor.name.to_string(),
            control,
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownField(name) => write!(f, "unknown form field `{name}`"),
            Self::UnknownControlKind(tag) => write!(
                f,
                "unknown control kind `{tag}`; expected text|single_choice|multi_choice"
            ),
            Self::ControlKindMismatch { field, control } => write!(
                f,
                "control kind `{}` cannot update field `{field}`",
                control.as_str()
            ),
            Self::DuplicateField(name) => write!(f, "form field `{name}` declared twice"),
            Self::UnsupportedDescriptor(name) => {
                write!(f, "form field `{name}` cannot be a multi-valued text field")
            }
            Self::MissingRequired(name) => write!(f, "form field `{name}` is required"),
            Self::NotEditable(phase) => {
                write!(f, "form is not editable in phase `{}`", phase.as_str())
            }
        }
    }
}

impl Error for ValidationError {}

/// Rejected change; the prior state is always kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeError {
    Validation(ValidationError),
    Coercion(CoercionError),
}

impl Display for ChangeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Coercion(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ChangeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Coercion(err) => Some(err),
        }
    }
}

impl From<ValidationError> for ChangeError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<CoercionError> for ChangeError {
    fn from(value: CoercionError) -> Self {
        Self::Coercion(value)
    }
}

/// Failure reported by a mutation executor.
///
/// `code` is machine-readable (`snake_case`); `message` is for humans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationError {
    pub code: String,
    pub message: String,
}

impl MutationError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl Display for MutationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl Error for MutationError {}

/// Submit failure: rejected before the executor ran, or reported by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    Validation(ValidationError),
    Mutation(MutationError),
}

impl Display for SubmitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Mutation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SubmitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Mutation(err) => Some(err),
        }
    }
}

impl From<ValidationError> for SubmitError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<MutationError> for SubmitError {
    fn from(value: MutationError) -> Self {
        Self::Mutation(value)
    }
}
