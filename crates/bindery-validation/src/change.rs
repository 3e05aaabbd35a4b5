#![forbid(unsafe_code)]

//! Diffed validation-change events.
//!
//! Listeners are told only what moved between two validation passes of the
//! same subject. [`diff`] computes the delta by message value-equality, and
//! [`DefaultValidationResult`] turns a pass into a [`ValidationChange`] when,
//! and only when, the message set actually changed.
//!
//! # Invariants
//!
//! 1. `added = next - previous`, `removed = previous - next`.
//! 2. Identical sets produce no event at all.
//! 3. Every event carries the complete current set alongside the deltas.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bindery_core::{ChangeEmitter, Subscription};

use crate::error::ValidationFailure;
use crate::message::{Message, MessageSet, Severity};
use crate::result::ValidationResult;

/// Global counter for unique subject IDs.
static SUBJECT_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// The thing a set of messages is about, usually one form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubjectId(u64);

impl SubjectId {
    /// Allocate a fresh, process-unique subject ID.
    #[must_use]
    pub fn next() -> Self {
        Self(SUBJECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subject#{}", self.0)
    }
}

/// Messages gained and lost between two passes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageDiff {
    pub added: MessageSet,
    pub removed: MessageSet,
}

impl MessageDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compute the value-equality delta from `previous` to `next`.
#[must_use]
pub fn diff(previous: &MessageSet, next: &MessageSet) -> MessageDiff {
    MessageDiff {
        added: next.difference(previous).cloned().collect(),
        removed: previous.difference(next).cloned().collect(),
    }
}

/// A subject's message set changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationChange {
    pub subject: SubjectId,
    /// The complete set after the change.
    pub messages: MessageSet,
    pub added: MessageSet,
    pub removed: MessageSet,
}

impl ValidationChange {
    /// Number of errors in the current set.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_error()).count()
    }
}

/// Collecting sink that remembers the previous pass and diffs against it.
///
/// Usage: [`begin`](Self::begin), let validators [`add`](ValidationResult::add),
/// then [`finish`](Self::finish). `finish` returns the event (if any) so that
/// owners holding this result inside a `RefCell` can release the borrow before
/// emitting; [`finish_and_notify`](Self::finish_and_notify) emits directly.
pub struct DefaultValidationResult {
    subject: SubjectId,
    messages: MessageSet,
    pending: MessageSet,
    changes: ChangeEmitter<ValidationChange>,
}

impl DefaultValidationResult {
    #[must_use]
    pub fn new(subject: SubjectId) -> Self {
        Self {
            subject,
            messages: MessageSet::new(),
            pending: MessageSet::new(),
            changes: ChangeEmitter::new(),
        }
    }

    #[must_use]
    pub fn subject(&self) -> SubjectId {
        self.subject
    }

    /// Messages of the last finished pass.
    #[must_use]
    pub fn messages(&self) -> &MessageSet {
        &self.messages
    }

    /// Handle to the emitter that [`finish_and_notify`](Self::finish_and_notify)
    /// fires on.
    #[must_use]
    pub fn changes(&self) -> ChangeEmitter<ValidationChange> {
        self.changes.clone()
    }

    pub fn subscribe(&self, callback: impl Fn(&ValidationChange) + 'static) -> Subscription {
        self.changes.subscribe(callback)
    }

    /// Start a new pass.
    pub fn begin(&mut self) {
        self.pending.clear();
    }

    /// Close the pass and diff it against the previous one.
    pub fn finish(&mut self) -> Option<ValidationChange> {
        let next = std::mem::take(&mut self.pending);
        self.replace(next)
    }

    /// Close the pass and emit the resulting change, if any.
    pub fn finish_and_notify(&mut self) -> Option<ValidationChange> {
        let change = self.finish();
        if let Some(change) = &change {
            self.changes.emit(change);
        }
        change
    }

    /// Replace the current set wholesale, returning the diff as an event.
    pub fn replace(&mut self, next: MessageSet) -> Option<ValidationChange> {
        let delta = diff(&self.messages, &next);
        if delta.is_empty() {
            return None;
        }
        tracing::trace!(
            subject = %self.subject,
            added = delta.added.len(),
            removed = delta.removed.len(),
            "validation messages changed"
        );
        self.messages = next;
        Some(ValidationChange {
            subject: self.subject,
            messages: self.messages.clone(),
            added: delta.added,
            removed: delta.removed,
        })
    }
}

impl ValidationResult for DefaultValidationResult {
    fn add(&mut self, message: Message) -> Result<(), ValidationFailure> {
        self.pending.insert(message);
        Ok(())
    }

    fn max_severity(&self) -> Option<Severity> {
        crate::message::max_severity(&self.pending)
    }
}

impl fmt::Debug for DefaultValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultValidationResult")
            .field("subject", &self.subject)
            .field("messages", &self.messages)
            .field("pending", &self.pending.len())
            .finish()
    }
}
