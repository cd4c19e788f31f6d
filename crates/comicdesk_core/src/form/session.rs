//! Per-form lifecycle around the synchronizer.
//!
//! # Invariants
//! - Phase flow: `Mounted -> Editing -> Submitting -> SubmittedSuccess ->
//!   Closed`; a failed submit returns to `Editing`.
//! - Changes are accepted only in `Mounted` and `Editing`.
//! - `submit` borrows the session mutably, so one submit per session can be
//!   in flight at a time.
//! - An edit session resets to the values of the record it was opened with.

use crate::form::contract::{CatalogQueryProvider, MutationExecutor};
use crate::form::error::{ChangeError, SubmitError, ValidationError};
use crate::form::record::FormRecord;
use crate::form::state::{ChangeEvent, FormState};
use crate::form::synchronizer::FormSynchronizer;
use crate::model::catalog::ReferenceLists;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPhase {
    Mounted,
    Editing,
    Submitting,
    SubmittedSuccess,
    Closed,
}

impl FormPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mounted => "mounted",
            Self::Editing => "editing",
            Self::Submitting => "submitting",
            Self::SubmittedSuccess => "submitted_success",
            Self::Closed => "closed",
        }
    }
}

/// One mounted form: its synchronizer, reference lists, state and phase.
#[derive(Debug, Clone)]
pub struct FormSession {
    synchronizer: FormSynchronizer,
    lists: ReferenceLists,
    state: FormState,
    phase: FormPhase,
    /// Record values an edit session started from; `None` for new records.
    origin: Option<FormState>,
}

impl FormSession {
    /// Mounts a form with reference lists loaded from `provider`.
    pub fn mount<P: CatalogQueryProvider>(
        synchronizer: FormSynchronizer,
        provider: &P,
    ) -> Result<Self, P::Error> {
        let lists = provider.reference_lists()?;
        Ok(Self::with_lists(synchronizer, lists))
    }

    pub fn with_lists(synchronizer: FormSynchronizer, lists: ReferenceLists) -> Self {
        let state = synchronizer.initialize(&lists);
        Self {
            synchronizer,
            lists,
            state,
            phase: FormPhase::Mounted,
            origin: None,
        }
    }

    /// Mounts an edit form pre-filled from `record`.
    pub fn mount_edit<P: CatalogQueryProvider, T: FormRecord>(
        synchronizer: FormSynchronizer,
        provider: &P,
        record: &T,
    ) -> Result<Self, P::Error> {
        let lists = provider.reference_lists()?;
        Ok(Self::with_record(synchronizer, lists, record))
    }

    pub fn with_record<T: FormRecord>(
        synchronizer: FormSynchronizer,
        lists: ReferenceLists,
        record: &T,
    ) -> Self {
        let origin = synchronizer.initialize_from_record(&lists, record);
        Self {
            synchronizer,
            lists,
            state: origin.clone(),
            phase: FormPhase::Mounted,
            origin: Some(origin),
        }
    }

    /// Whether this session edits a stored record.
    pub fn is_edit(&self) -> bool {
        self.origin.is_some()
    }

    pub fn synchronizer(&self) -> &FormSynchronizer {
        &self.synchronizer
    }

    pub fn lists(&self) -> &ReferenceLists {
        &self.lists
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn phase(&self) -> FormPhase {
        self.phase
    }

    /// Applies one change. Returns whether the state value changed.
    pub fn apply(&mut self, event: &ChangeEvent) -> Result<bool, ChangeError> {
        self.ensure_editable()?;
        let next = self.synchronizer.apply_change(&self.state, event)?;
        let changed = next != self.state;
        self.state = next;
        self.phase = FormPhase::Editing;
        Ok(changed)
    }

    /// Applies one change with a string control kind tag.
    pub fn apply_tagged(
        &mut self,
        field: &str,
        raw_value: &str,
        control_tag: &str,
        is_active: bool,
    ) -> Result<bool, ChangeError> {
        self.ensure_editable()?;
        let next = self.synchronizer.apply_tagged_change(
            &self.state,
            field,
            raw_value,
            control_tag,
            is_active,
        )?;
        let changed = next != self.state;
        self.state = next;
        self.phase = FormPhase::Editing;
        Ok(changed)
    }

    /// Submits the current state. State is kept on both success and failure.
    pub async fn submit<E: MutationExecutor>(
        &mut self,
        executor: &E,
    ) -> Result<E::Output, SubmitError> {
        self.ensure_editable()?;
        self.phase = FormPhase::Submitting;
        match self.synchronizer.submit(&self.state, executor).await {
            Ok(output) => {
                self.phase = FormPhase::SubmittedSuccess;
                Ok(output)
            }
            Err(err) => {
                self.phase = FormPhase::Editing;
                Err(err)
            }
        }
    }

    /// Re-seeds state and returns to `Mounted`.
    ///
    /// New-record forms re-seed from the current lists; edit forms go back
    /// to the record values.
    pub fn reset(&mut self) {
        self.state = match &self.origin {
            Some(origin) => origin.clone(),
            None => self.synchronizer.reset(&self.lists),
        };
        self.phase = FormPhase::Mounted;
    }

    /// Re-fetches reference lists, then resets.
    ///
    /// Used after a related entity was created inline (e.g. a new author).
    /// On provider failure the session is left unchanged.
    pub fn refresh<P: CatalogQueryProvider>(&mut self, provider: &P) -> Result<(), P::Error> {
        self.lists = provider.reference_lists()?;
        self.reset();
        Ok(())
    }

    pub fn close(&mut self) {
        self.phase = FormPhase::Closed;
    }

    fn ensure_editable(&self) -> Result<(), ValidationError> {
        match self.phase {
            FormPhase::Mounted | FormPhase::Editing => Ok(()),
            other => Err(ValidationError::NotEditable(other)),
        }
    }
}
