//! Boundary between raw UI edits and the calculator.
//!
//! The calculator itself is synchronous and timing-free. A session owns one
//! [`NegotiationState`], debounces scalar edits through an [`EditQueue`] and
//! applies them one at a time, each as a whole transaction.

pub mod queue;

pub use queue::{EditQueue, Enqueued};

use serde::Serialize;

use crate::config::NegotiationConfig;
use crate::error::NegotiationError;
use crate::negotiation::state::{Edit, EditField, EditOutcome, NegotiationState};
use crate::NegotiationResult;

/// Result of one applied edit.
#[derive(Debug, Clone, Serialize)]
pub struct Applied {
    pub field: EditField,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<EditOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

/// Re-entrancy guard: at most one field is being processed at a time.
#[derive(Debug, Clone, Default)]
pub struct EditGuard {
    active: Option<EditField>,
}

impl EditGuard {
    /// Claim the guard for `field`. A second claim for the same field is
    /// allowed (the newer edit supersedes); a different field is rejected.
    pub fn begin(&mut self, field: EditField) -> NegotiationResult<()> {
        match self.active {
            Some(active) if active != field => Err(NegotiationError::EditInProgress {
                active: active.to_string(),
                requested: field.to_string(),
            }),
            _ => {
                self.active = Some(field);
                Ok(())
            }
        }
    }

    /// Whether an edit of `field` may run now.
    pub fn admits(&self, field: EditField) -> bool {
        self.active.map_or(true, |active| active == field)
    }

    pub fn finish(&mut self) {
        self.active = None;
    }

    pub fn active(&self) -> Option<EditField> {
        self.active
    }
}

#[derive(Debug, Clone)]
pub struct NegotiationSession {
    state: NegotiationState,
    queue: EditQueue,
    guard: EditGuard,
}

impl NegotiationSession {
    pub fn new(state: NegotiationState) -> Self {
        let debounce_ms = state.config().debounce_ms;
        Self {
            state,
            queue: EditQueue::new(debounce_ms),
            guard: EditGuard::default(),
        }
    }

    pub fn start(gross_value: rust_decimal::Decimal, config: NegotiationConfig) -> NegotiationResult<Self> {
        Ok(NegotiationSession::new(NegotiationState::with_gross_value(
            gross_value,
            config,
        )?))
    }

    /// Last committed state; never an intermediate one.
    pub fn state(&self) -> &NegotiationState {
        &self.state
    }

    pub fn into_state(self) -> NegotiationState {
        self.state
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn next_due_ms(&self) -> Option<u64> {
        self.queue.next_due_ms()
    }

    pub fn submit(&mut self, edit: Edit, now_ms: u64) -> Enqueued {
        let enqueued = self.queue.push(edit, now_ms);
        tracing::trace!(?enqueued, now_ms, pending = self.queue.len(), "edit submitted");
        enqueued
    }

    /// Apply every edit that is due at `now_ms`, in arrival order. Stops at
    /// an edit to another field while an edit is in progress; it stays queued.
    pub fn pump(&mut self, now_ms: u64) -> Vec<Applied> {
        let mut applied = Vec::new();
        while self.head_admitted() {
            match self.queue.pop_due(now_ms) {
                Some(edit) => applied.push(self.process(&edit)),
                None => break,
            }
        }
        applied
    }

    /// Apply everything still pending, ignoring debounce windows but not an
    /// edit in progress.
    pub fn flush(&mut self) -> Vec<Applied> {
        let mut applied = Vec::new();
        while self.head_admitted() {
            match self.queue.pop_now() {
                Some(edit) => applied.push(self.process(&edit)),
                None => break,
            }
        }
        applied
    }

    /// Apply one edit immediately, bypassing the queue.
    pub fn apply_now(&mut self, edit: &Edit) -> NegotiationResult<EditOutcome> {
        let field = edit.field();
        self.guard.begin(field)?;
        let result = self.state.apply(edit);
        self.guard.finish();
        result
    }

    /// Hold `field` open while its value is still being worked out (a solve
    /// the caller runs in steps, a field the user is still typing into).
    /// Edits to any other field are rejected or left queued until
    /// [`commit`](Self::commit) or [`abandon_edit`](Self::abandon_edit).
    pub fn begin_edit(&mut self, field: EditField) -> NegotiationResult<()> {
        self.guard.begin(field)?;
        tracing::debug!(%field, "edit in progress");
        Ok(())
    }

    /// Apply the edit for the field held open by [`begin_edit`](Self::begin_edit)
    /// and release it, whether or not the edit succeeds.
    pub fn commit(&mut self, edit: &Edit) -> NegotiationResult<EditOutcome> {
        let field = edit.field();
        match self.guard.active() {
            Some(active) if active == field => {}
            Some(active) => {
                return Err(NegotiationError::EditInProgress {
                    active: active.to_string(),
                    requested: field.to_string(),
                })
            }
            None => {
                return Err(NegotiationError::InvalidInput {
                    field: field.to_string(),
                    reason: "No edit in progress to commit".into(),
                })
            }
        }
        let result = self.state.apply(edit);
        self.guard.finish();
        result
    }

    /// Release a held field without applying anything.
    pub fn abandon_edit(&mut self) {
        self.guard.finish();
    }

    pub fn edit_in_progress(&self) -> Option<EditField> {
        self.guard.active()
    }

    fn head_admitted(&self) -> bool {
        self.queue
            .head_field()
            .map_or(false, |field| self.guard.admits(field))
    }

    fn process(&mut self, edit: &Edit) -> Applied {
        let field = edit.field();
        match self.apply_now(edit) {
            Ok(outcome) => Applied {
                field,
                outcome: Some(outcome),
                error: None,
                error_code: None,
            },
            Err(e) => Applied {
                field,
                outcome: None,
                error_code: Some(e.code()),
                error: Some(e.to_string()),
            },
        }
    }
}
