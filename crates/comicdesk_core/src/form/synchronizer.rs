//! Form state synchronizer.
//!
//! # Responsibility
//! - Seed initial state from reference lists.
//! - Translate raw control changes into typed state transitions.
//! - Hand the current state to a mutation executor on submit.
//!
//! # Invariants
//! - `apply_change` is pure: the input state is never modified, and a
//!   rejected change leaves the caller's state untouched.
//! - Only the named field differs between input and output states.
//! - Identifier coercion happens here and nowhere downstream.
//! - Raw field values are never logged: change events carry the value
//!   shape and error text is redacted.

use crate::form::contract::MutationExecutor;
use crate::form::error::{ChangeError, SubmitError, ValidationError};
use crate::form::field::{Coercion, ControlKind, FieldArity, FieldDescriptor, FormSchema};
use crate::form::record::FormRecord;
use crate::form::state::{ChangeEvent, FieldValue, FormState};
use crate::logging::{redact_quoted, value_shape};
use crate::model::catalog::{parse_entity_id, CoercionError, EntityId, ReferenceLists};
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// Pre-submit checking mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmitPolicy {
    /// Reject blank required text and unset required ids before submitting.
    #[default]
    Strict,
    /// Pass whatever is staged to the executor; the executor validates.
    Permissive,
}

/// Owns a form schema and implements the form state transitions.
#[derive(Debug, Clone)]
pub struct FormSynchronizer {
    schema: FormSchema,
    policy: SubmitPolicy,
}

impl FormSynchronizer {
    pub fn new(schema: FormSchema) -> Self {
        Self {
            schema,
            policy: SubmitPolicy::default(),
        }
    }

    pub fn with_submit_policy(mut self, policy: SubmitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn submit_policy(&self) -> SubmitPolicy {
        self.policy
    }

    /// Builds the initial state for a freshly mounted form.
    ///
    /// Text fields start empty, multi fields start as empty sets, scalar id
    /// fields take the first id of their seed list or stay unset.
    pub fn initialize(&self, lists: &ReferenceLists) -> FormState {
        let values = self
            .schema
            .fields()
            .iter()
            .map(|descriptor| (descriptor.name.to_string(), initial_value(descriptor, lists)))
            .collect::<BTreeMap<_, _>>();
        FormState::from_values(values)
    }

    /// Builds the initial state of an edit form from a stored record.
    ///
    /// Fields the record does not supply, or supplies in a shape that does
    /// not fit the descriptor, fall back to their `initialize` value.
    pub fn initialize_from_record<T: FormRecord>(
        &self,
        lists: &ReferenceLists,
        record: &T,
    ) -> FormState {
        let values = self
            .schema
            .fields()
            .iter()
            .map(|descriptor| {
                let value = record
                    .field_value(descriptor.name)
                    .filter(|value| fits(descriptor, value))
                    .unwrap_or_else(|| initial_value(descriptor, lists));
                (descriptor.name.to_string(), value)
            })
            .collect::<BTreeMap<_, _>>();
        FormState::from_values(values)
    }

    /// Returns the state after applying one control change.
    ///
    /// # Errors
    /// - `Validation` when the field is not declared or the control kind does
    ///   not fit the field.
    /// - `Coercion` when an identifier control carries a non-integer value.
    pub fn apply_change(
        &self,
        state: &FormState,
        event: &ChangeEvent,
    ) -> Result<FormState, ChangeError> {
        match self.next_value(state, event) {
            Ok(value) => {
                debug!(
                    "event=form_change module=form status=ok form={} field={} control={} value={}",
                    self.schema.name(),
                    event.field,
                    event.control.as_str(),
                    value_shape(&value)
                );
                Ok(state.with_value(&event.field, value))
            }
            Err(err) => {
                match &err {
                    ChangeError::Validation(_) => error!(
                        "event=form_change module=form status=error form={} field={} control={} error_code=validation error={}",
                        self.schema.name(),
                        event.field,
                        event.control.as_str(),
                        redact_quoted(&err.to_string())
                    ),
                    ChangeError::Coercion(_) => warn!(
                        "event=form_change module=form status=rejected form={} field={} control={} error_code=coercion",
                        self.schema.name(),
                        event.field,
                        event.control.as_str()
                    ),
                }
                Err(err)
            }
        }
    }

    /// Like `apply_change`, with the control kind given as a string tag.
    pub fn apply_tagged_change(
        &self,
        state: &FormState,
        field: &str,
        raw_value: &str,
        control_tag: &str,
        is_active: bool,
    ) -> Result<FormState, ChangeError> {
        let control = control_tag.parse::<ControlKind>()?;
        let event = ChangeEvent {
            field: field.to_string(),
            raw_value: raw_value.to_string(),
            control,
            is_active,
        };
        self.apply_change(state, &event)
    }

    /// Checks required fields: non-blank text, set scalar id.
    pub fn validate_required(&self, state: &FormState) -> Result<(), ValidationError> {
        for descriptor in self.schema.fields().iter().filter(|field| field.required) {
            let present = match state.get(descriptor.name) {
                Some(FieldValue::Text(value)) => !value.trim().is_empty(),
                Some(FieldValue::Id(value)) => value.is_some(),
                Some(FieldValue::IdSet(values)) => !values.is_empty(),
                None => false,
            };
            if !present {
                return Err(ValidationError::MissingRequired(descriptor.name));
            }
        }
        Ok(())
    }

    /// Submits the state to `executor` and returns its result unchanged.
    ///
    /// The state is not reset. Callers must not start a second submit for the
    /// same form while one is in flight; `FormSession` enforces this.
    pub async fn submit<E: MutationExecutor>(
        &self,
        state: &FormState,
        executor: &E,
    ) -> Result<E::Output, SubmitError> {
        if self.policy == SubmitPolicy::Strict {
            if let Err(err) = self.validate_required(state) {
                warn!(
                    "event=form_submit module=form status=rejected form={} error_code=validation error={}",
                    self.schema.name(),
                    redact_quoted(&err.to_string())
                );
                return Err(err.into());
            }
        }

        let started_at = Instant::now();
        let payload = state.to_payload();
        info!(
            "event=form_submit module=form status=start form={} fields={}",
            self.schema.name(),
            payload.len()
        );

        match executor.execute(&payload).await {
            Ok(output) => {
                info!(
                    "event=form_submit module=form status=ok form={} duration_ms={}",
                    self.schema.name(),
                    started_at.elapsed().as_millis()
                );
                Ok(output)
            }
            Err(err) => {
                warn!(
                    "event=form_submit module=form status=error form={} duration_ms={} error_code={}",
                    self.schema.name(),
                    started_at.elapsed().as_millis(),
                    err.code
                );
                Err(err.into())
            }
        }
    }

    /// Fresh initial state, seeded from the (possibly re-fetched) lists.
    pub fn reset(&self, lists: &ReferenceLists) -> FormState {
        self.initialize(lists)
    }

    fn next_value(&self, state: &FormState, event: &ChangeEvent) -> Result<FieldValue, ChangeError> {
        let descriptor = self
            .schema
            .descriptor(&event.field)
            .ok_or_else(|| ValidationError::UnknownField(event.field.clone()))?;
        if !descriptor.accepts(event.control) {
            return Err(ValidationError::mismatch(descriptor, event.control).into());
        }

        let value = match event.control {
            ControlKind::Text => FieldValue::Text(event.raw_value.clone()),
            ControlKind::SingleChoice => {
                FieldValue::Id(Some(coerce_id(descriptor, &event.raw_value)?))
            }
            ControlKind::MultiChoice => {
                let id = coerce_id(descriptor, &event.raw_value)?;
                let current = state.ids(descriptor.name);
                FieldValue::IdSet(toggle_membership(current, id, event.is_active))
            }
        };
        Ok(value)
    }
}

fn initial_value(descriptor: &FieldDescriptor, lists: &ReferenceLists) -> FieldValue {
    match (descriptor.arity, descriptor.coercion) {
        (FieldArity::Multi, _) => FieldValue::IdSet(BTreeSet::new()),
        (FieldArity::Scalar, Coercion::Text) => FieldValue::Text(String::new()),
        (FieldArity::Scalar, Coercion::IntegerId) => {
            FieldValue::Id(descriptor.seed.and_then(|kind| lists.first_id(kind)))
        }
    }
}

fn fits(descriptor: &FieldDescriptor, value: &FieldValue) -> bool {
    matches!(
        (descriptor.control_kind(), value),
        (ControlKind::Text, FieldValue::Text(_))
            | (ControlKind::SingleChoice, FieldValue::Id(_))
            | (ControlKind::MultiChoice, FieldValue::IdSet(_))
    )
}

fn coerce_id(descriptor: &FieldDescriptor, raw: &str) -> Result<EntityId, CoercionError> {
    parse_entity_id(raw).map_err(|_| CoercionError::for_field(descriptor.name, raw))
}

/// Builds the next membership set without touching `current`.
fn toggle_membership(
    current: Option<&BTreeSet<EntityId>>,
    id: EntityId,
    is_active: bool,
) -> BTreeSet<EntityId> {
    let mut next = current.cloned().unwrap_or_default();
    if is_active {
        next.insert(id);
    } else {
        next.remove(&id);
    }
    next
}
