use serde::Serialize;
use std::collections::VecDeque;

use crate::negotiation::state::{Edit, EditField};

/// How a submitted edit entered the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Enqueued {
    Queued,
    /// Replaced a pending edit to the same field and restarted its window.
    Superseded,
}

#[derive(Debug, Clone)]
struct Pending {
    edit: Edit,
    field: EditField,
    due_at_ms: u64,
}

/// Debounce queue for raw edits, driven by caller-supplied millisecond
/// timestamps so it never touches a clock.
///
/// Scalar edits wait `debounce_ms` of quiet; a newer edit to the same field
/// replaces the pending one in place. Instrument mutations are due at once.
/// Edits leave strictly in arrival order, so a due edit waits behind an
/// earlier one that is still settling.
#[derive(Debug, Clone)]
pub struct EditQueue {
    debounce_ms: u64,
    pending: VecDeque<Pending>,
}

impl EditQueue {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            pending: VecDeque::new(),
        }
    }

    pub fn push(&mut self, edit: Edit, now_ms: u64) -> Enqueued {
        let field = edit.field();
        if !field.is_scalar() {
            self.pending.push_back(Pending {
                edit,
                field,
                due_at_ms: now_ms,
            });
            return Enqueued::Queued;
        }

        let due_at_ms = now_ms.saturating_add(self.debounce_ms);
        if let Some(existing) = self.pending.iter_mut().find(|p| p.field == field) {
            existing.edit = edit;
            existing.due_at_ms = due_at_ms;
            return Enqueued::Superseded;
        }
        self.pending.push_back(Pending {
            edit,
            field,
            due_at_ms,
        });
        Enqueued::Queued
    }

    /// Next edit whose quiet window has elapsed, if the head of the queue is due.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<Edit> {
        match self.pending.front() {
            Some(head) if head.due_at_ms <= now_ms => self.pending.pop_front().map(|p| p.edit),
            _ => None,
        }
    }

    /// Take the head regardless of its window.
    pub fn pop_now(&mut self) -> Option<Edit> {
        self.pending.pop_front().map(|p| p.edit)
    }

    /// Field of the edit at the head of the queue.
    pub fn head_field(&self) -> Option<EditField> {
        self.pending.front().map(|p| p.field)
    }

    /// When the head becomes due, for scheduling the next pump.
    pub fn next_due_ms(&self) -> Option<u64> {
        self.pending.front().map(|p| p.due_at_ms)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
