#![forbid(unsafe_code)]

//! Validation adapters: the per-field producers of validation events.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use bindery_binding::{Source, ValueChange};
use bindery_core::{ChangeEmitter, Subscription};
use bindery_validation::{
    CollectingValidationResult, DefaultValidationResult, MessageSet, SubjectId, ValidationChange, ValidationFailure,
    Validator,
};

/// Produces diffed validation events for one subject.
pub trait ValidationAdapter {
    fn subject(&self) -> SubjectId;

    /// Run a validation pass. Listeners are notified only if the message set
    /// changed.
    fn validate(&self) -> Result<(), ValidationFailure>;

    fn subscribe_validation(&self, listener: Box<dyn Fn(&ValidationChange)>) -> Subscription;

    /// Messages of the last pass.
    fn messages(&self) -> MessageSet;
}

struct AdapterInner<T: 'static> {
    source: Source<T>,
    validator: Option<Rc<dyn Validator<T>>>,
    result: RefCell<DefaultValidationResult>,
    changes: ChangeEmitter<ValidationChange>,
    value_sub: RefCell<Option<Subscription>>,
}

/// Validates the current value of a binding.
///
/// A pass runs the adapter's own validator and then, if the binding is
/// validating, the binding's validation chain, all into one diffing result.
pub struct BindingAdapter<T: 'static> {
    inner: Rc<AdapterInner<T>>,
}

impl<T: 'static> Clone for BindingAdapter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> fmt::Debug for BindingAdapter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingAdapter")
            .field("result", &*self.inner.result.borrow())
            .field("validate_on_change", &self.validates_on_change())
            .finish()
    }
}

impl<T: 'static> BindingAdapter<T> {
    #[must_use]
    pub fn new(source: Source<T>) -> Self {
        Self::build(source, None)
    }

    #[must_use]
    pub fn with_validator(source: Source<T>, validator: Rc<dyn Validator<T>>) -> Self {
        Self::build(source, Some(validator))
    }

    fn build(source: Source<T>, validator: Option<Rc<dyn Validator<T>>>) -> Self {
        let result = DefaultValidationResult::new(SubjectId::next());
        let changes = result.changes();
        Self {
            inner: Rc::new(AdapterInner {
                source,
                validator,
                result: RefCell::new(result),
                changes,
                value_sub: RefCell::new(None),
            }),
        }
    }

    /// Re-validate whenever the bound value changes.
    pub fn validate_on_change(&self, enabled: bool) {
        let sub = enabled.then(|| {
            let weak = Rc::downgrade(&self.inner);
            self.inner
                .source
                .subscribe_value(Box::new(move |_: &ValueChange<T>| {
                    if let Some(inner) = weak.upgrade() {
                        let adapter = BindingAdapter { inner };
                        if let Err(err) = adapter.validate() {
                            tracing::warn!(
                                subject = %adapter.subject(),
                                error = %err,
                                "validation on change failed"
                            );
                        }
                    }
                }))
        });
        let previous = self.inner.value_sub.replace(sub);
        drop(previous);
    }

    #[must_use]
    pub fn validates_on_change(&self) -> bool {
        self.inner.value_sub.borrow().is_some()
    }

    #[must_use]
    pub fn source(&self) -> Source<T> {
        Rc::clone(&self.inner.source)
    }

    /// Replace the message set directly, bypassing the validators.
    ///
    /// For messages that come from outside the binding, such as a server
    /// round-trip. The next [`validate`](ValidationAdapter::validate) pass
    /// recomputes the set from the validators again.
    pub fn report(&self, messages: MessageSet) {
        let change = self.inner.result.borrow_mut().replace(messages);
        if let Some(change) = change {
            self.inner.changes.emit(&change);
        }
    }
}

impl<T: 'static> ValidationAdapter for BindingAdapter<T> {
    fn subject(&self) -> SubjectId {
        self.inner.result.borrow().subject()
    }

    fn validate(&self) -> Result<(), ValidationFailure> {
        let value = self.inner.source.value();
        // Validators may read this adapter, so no borrow is held while they run.
        let mut pass = CollectingValidationResult::new();
        if let Some(validator) = &self.inner.validator {
            validator.validate(value.as_ref(), &mut pass)?;
        }
        if self.inner.source.is_validating() {
            self.inner.source.validate_value(value.as_ref(), &mut pass)?;
        }
        let change = self.inner.result.borrow_mut().replace(pass.into_messages());
        if let Some(change) = change {
            self.inner.changes.emit(&change);
        }
        Ok(())
    }

    fn subscribe_validation(&self, listener: Box<dyn Fn(&ValidationChange)>) -> Subscription {
        self.inner.changes.subscribe_boxed(listener)
    }

    fn messages(&self) -> MessageSet {
        self.inner.result.borrow().messages().clone()
    }
}
