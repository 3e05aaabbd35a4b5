#![forbid(unsafe_code)]

//! Write buffering.
//!
//! A [`BufferedBinding<T>`] separates the value being edited (`current`)
//! from the value last read from or written to its source (`original`). The
//! `buffering` flag is true exactly while the two differ, which is what a
//! save button binds to.
//!
//! # Invariants
//!
//! 1. `is_buffering() == !equal(original, current)` after every operation.
//! 2. `set_value` fires the value change first, then a buffering change only
//!    if the flag flipped.
//! 3. `reset`, `flush` and `commit` always fire a value change, even when
//!    `current` already held the reset value.
//! 4. After a successful `commit`, `original == current == source value`.
//!
//! # Failure Modes
//!
//! - Source rejects the write on commit: the error propagates and the
//!   buffer keeps its edit.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use bindery_core::{ChangeEmitter, Equality, PropertyChange, Subscription};
use bindery_validation::{ValidationFailure, ValidationResult, Validator};

use crate::chained::ChainedBinding;
use crate::converter::ConverterBinding;
use crate::error::BindingError;
use crate::value::{Binding, Source, VALUE, ValueChange, ValueModel};

/// Property name carried by buffering notifications.
pub const BUFFERING: &str = "buffering";

static BUFFER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity of a buffer, used for group membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(u64);

impl BufferId {
    /// Allocate a fresh, process-unique buffer ID.
    #[must_use]
    pub fn next() -> Self {
        Self(BUFFER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

/// Something holding uncommitted edits.
pub trait Buffer {
    fn buffer_id(&self) -> BufferId;

    /// Whether there are edits not yet committed.
    fn is_buffering(&self) -> bool;

    /// Push edits to the source.
    fn commit(&self) -> Result<(), BindingError>;

    /// Discard edits, reloading from the source.
    fn flush(&self) -> Result<(), BindingError>;

    /// Register a listener for buffering-flag changes.
    fn subscribe_buffering(&self, listener: Box<dyn Fn(&PropertyChange<bool>)>) -> Subscription;
}

/// Runtime check for the [`Buffer`] capability.
pub trait AsBuffer {
    /// A shared handle to `self` as a buffer, if it is one.
    fn as_buffer(&self) -> Option<Rc<dyn Buffer>>;
}

impl<T: Clone + PartialEq + 'static> AsBuffer for Binding<T> {
    fn as_buffer(&self) -> Option<Rc<dyn Buffer>> {
        None
    }
}

impl<S: Clone + 'static, T: Clone + PartialEq + 'static> AsBuffer for ChainedBinding<S, T> {
    fn as_buffer(&self) -> Option<Rc<dyn Buffer>> {
        None
    }
}

impl<S: Clone + 'static, T: Clone + PartialEq + 'static> AsBuffer for ConverterBinding<S, T> {
    fn as_buffer(&self) -> Option<Rc<dyn Buffer>> {
        None
    }
}

struct BufferState<T: 'static> {
    source: Option<Source<T>>,
    source_sub: Option<Subscription>,
    original: Option<T>,
    current: Option<T>,
    buffering: bool,
}

struct BufferedInner<T: 'static> {
    id: BufferId,
    equality: Equality<T>,
    validator: Option<Rc<dyn Validator<T>>>,
    state: RefCell<BufferState<T>>,
    value_changes: ChangeEmitter<ValueChange<T>>,
    buffering_changes: ChangeEmitter<PropertyChange<bool>>,
}

/// A binding that holds edits until committed.
pub struct BufferedBinding<T: 'static> {
    inner: Rc<BufferedInner<T>>,
}

impl<T: 'static> Clone for BufferedBinding<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for BufferedBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("BufferedBinding")
            .field("id", &self.inner.id)
            .field("original", &state.original)
            .field("current", &state.current)
            .field("buffering", &state.buffering)
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> BufferedBinding<T> {
    /// A buffer over `source`, starting with the source's value.
    #[must_use]
    pub fn new(source: Source<T>) -> Self {
        Self::builder().source(source).build()
    }

    #[must_use]
    pub fn builder() -> BufferedBindingBuilder<T> {
        BufferedBindingBuilder::new()
    }

    /// The value last synchronized with the source.
    #[must_use]
    pub fn original(&self) -> Option<T> {
        self.inner.state.borrow().original.clone()
    }

    #[must_use]
    pub fn source(&self) -> Option<Source<T>> {
        self.inner.state.borrow().source.clone()
    }

    pub fn subscribe(&self, callback: impl Fn(&ValueChange<T>) + 'static) -> Subscription {
        self.inner.value_changes.subscribe(callback)
    }

    pub fn subscribe_buffering_changes(
        &self,
        callback: impl Fn(&PropertyChange<bool>) + 'static,
    ) -> Subscription {
        self.inner.buffering_changes.subscribe(callback)
    }

    /// Replace the source and reload from it, discarding edits.
    pub fn set_source(&self, source: Option<Source<T>>) {
        let sub = source.as_ref().map(|src| {
            let weak = Rc::downgrade(&self.inner);
            src.subscribe_value(Box::new(move |change: &ValueChange<T>| {
                if let Some(inner) = weak.upgrade() {
                    BufferedBinding { inner }.update(change.new.clone());
                }
            }))
        });
        let initial = source.as_ref().and_then(|src| src.value());
        let old_sub = {
            let mut state = self.inner.state.borrow_mut();
            state.source = source;
            std::mem::replace(&mut state.source_sub, sub)
        };
        drop(old_sub);
        self.reset(initial);
    }

    /// Take a new original from the source. Returns whether it changed.
    ///
    /// A buffer with no pending edits follows the source, so `current`
    /// moves along with `original` and listeners see the new value.
    pub fn update(&self, new_original: Option<T>) -> bool {
        let (value_change, flipped) = {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;
            if self.inner.equality.equal(&state.original, &new_original) {
                return false;
            }
            let was_buffering = state.buffering;
            state.original = new_original;
            let value_change = if was_buffering {
                None
            } else {
                let old = std::mem::replace(&mut state.current, state.original.clone());
                Some(PropertyChange::new(VALUE, old, state.current.clone()))
            };
            state.buffering = !self.inner.equality.equal(&state.original, &state.current);
            (value_change, (was_buffering != state.buffering).then_some(state.buffering))
        };
        if let Some(change) = value_change {
            self.inner.value_changes.emit(&change);
        }
        if let Some(now) = flipped {
            self.inner.buffering_changes.notify(BUFFERING, !now, now);
        }
        true
    }

    /// Set both `original` and `current` to `value`, always notifying.
    pub fn reset(&self, value: Option<T>) {
        let (old, was_buffering) = {
            let mut state = self.inner.state.borrow_mut();
            state.original = value.clone();
            let old = std::mem::replace(&mut state.current, value.clone());
            let was_buffering = std::mem::replace(&mut state.buffering, false);
            (old, was_buffering)
        };
        tracing::debug!(buffer = %self.inner.id, "buffer reset");
        self.inner.value_changes.notify(VALUE, old, value);
        if was_buffering {
            self.inner.buffering_changes.notify(BUFFERING, true, false);
        }
    }

    /// Fire a value notification for the current value without changing it.
    pub fn force_notify(&self) {
        let current = self.inner.state.borrow().current.clone();
        self.inner.value_changes.notify(VALUE, current.clone(), current);
    }
}

impl<T: Clone + PartialEq + 'static> ValueModel<T> for BufferedBinding<T> {
    fn value(&self) -> Option<T> {
        self.inner.state.borrow().current.clone()
    }

    fn set_value(&self, value: Option<T>) -> Result<(), BindingError> {
        let (change, flipped) = {
            let mut state = self.inner.state.borrow_mut();
            if self.inner.equality.equal(&state.current, &value) {
                return Ok(());
            }
            let old = std::mem::replace(&mut state.current, value);
            let was_buffering = state.buffering;
            state.buffering = !self.inner.equality.equal(&state.original, &state.current);
            (
                PropertyChange::new(VALUE, old, state.current.clone()),
                (was_buffering != state.buffering).then_some(state.buffering),
            )
        };
        self.inner.value_changes.emit(&change);
        if let Some(now) = flipped {
            self.inner.buffering_changes.notify(BUFFERING, !now, now);
        }
        Ok(())
    }

    fn subscribe_value(&self, listener: Box<dyn Fn(&ValueChange<T>)>) -> Subscription {
        self.inner.value_changes.subscribe_boxed(listener)
    }

    /// Own validator first, then the source's, into the same sink.
    fn validate_value(
        &self,
        value: Option<&T>,
        result: &mut dyn ValidationResult,
    ) -> Result<(), ValidationFailure> {
        if let Some(validator) = &self.inner.validator {
            validator.validate(value, result)?;
        }
        match self.source() {
            Some(source) => source.validate_value(value, result),
            None => Ok(()),
        }
    }

    fn is_validating(&self) -> bool {
        self.inner.validator.is_some() || self.source().is_some_and(|src| src.is_validating())
    }
}

impl<T: Clone + PartialEq + 'static> Buffer for BufferedBinding<T> {
    fn buffer_id(&self) -> BufferId {
        self.inner.id
    }

    fn is_buffering(&self) -> bool {
        self.inner.state.borrow().buffering
    }

    fn commit(&self) -> Result<(), BindingError> {
        tracing::debug!(buffer = %self.inner.id, "buffer commit");
        let Some(source) = self.source() else {
            self.reset(None);
            return Ok(());
        };
        let current = self.value();
        source.set_value(current)?;
        self.reset(source.value());
        Ok(())
    }

    fn flush(&self) -> Result<(), BindingError> {
        tracing::debug!(buffer = %self.inner.id, "buffer flush");
        let reloaded = self.source().and_then(|src| src.value());
        self.reset(reloaded);
        Ok(())
    }

    fn subscribe_buffering(&self, listener: Box<dyn Fn(&PropertyChange<bool>)>) -> Subscription {
        self.inner.buffering_changes.subscribe_boxed(listener)
    }
}

impl<T: Clone + PartialEq + 'static> AsBuffer for BufferedBinding<T> {
    fn as_buffer(&self) -> Option<Rc<dyn Buffer>> {
        Some(Rc::new(self.clone()))
    }
}

/// Configuration for a [`BufferedBinding`].
pub struct BufferedBindingBuilder<T: 'static> {
    equality: Equality<T>,
    validator: Option<Rc<dyn Validator<T>>>,
    source: Option<Source<T>>,
}

impl<T: Clone + PartialEq + 'static> BufferedBindingBuilder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            equality: Equality::Value,
            validator: None,
            source: None,
        }
    }

    /// Comparator for dirty tracking and change suppression.
    #[must_use]
    pub fn equality(mut self, equality: Equality<T>) -> Self {
        self.equality = equality;
        self
    }

    #[must_use]
    pub fn validator(mut self, validator: Rc<dyn Validator<T>>) -> Self {
        self.validator = Some(validator);
        self
    }

    #[must_use]
    pub fn source(mut self, source: Source<T>) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn build(self) -> BufferedBinding<T> {
        let binding = BufferedBinding {
            inner: Rc::new(BufferedInner {
                id: BufferId::next(),
                equality: self.equality,
                validator: self.validator,
                state: RefCell::new(BufferState {
                    source: None,
                    source_sub: None,
                    original: None,
                    current: None,
                    buffering: false,
                }),
                value_changes: ChangeEmitter::new(),
                buffering_changes: ChangeEmitter::new(),
            }),
        };
        if self.source.is_some() {
            binding.set_source(self.source);
        }
        binding
    }
}

impl<T: Clone + PartialEq + 'static> Default for BufferedBindingBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
