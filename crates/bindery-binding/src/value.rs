#![forbid(unsafe_code)]

//! The value-cell capability and the plain [`Binding<T>`].
//!
//! [`ValueModel<T>`] is the seam every binding variant implements: read,
//! write, subscribe, and (optionally) validate a candidate value. Chains hold
//! their upstream as a type-erased [`Source<T>`], so a buffered binding can
//! sit on a converter which sits on a plain binding without any of them
//! knowing the concrete type below.
//!
//! Values are `Option<T>`: `None` is the "absent" value that chains produce
//! when they have nothing to derive from.
//!
//! # Invariants
//!
//! 1. `set_value(v)` with `v` equal to the current value (per the binding's
//!    [`Equality`]) fires nothing.
//! 2. An actual change fires exactly one notification, after the value-changed
//!    hook has run.
//! 3. A non-nullable binding never holds `None`; writing `None` fails with
//!    [`BindingError::InvalidArgument`] and leaves the value untouched.
//!
//! # Failure Modes
//!
//! - `set_value_vetoable` without veto support: [`BindingError::IllegalState`].
//! - A vetoer rejects: [`BindingError::Vetoed`], value untouched.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use bindery_core::{ChangeEmitter, Equality, PropertyChange, Subscription};
use bindery_validation::{ValidationFailure, ValidationResult, Validator};

use crate::error::BindingError;

/// Property name carried by value notifications.
pub const VALUE: &str = "value";

/// Value notification payload.
pub type ValueChange<T> = PropertyChange<Option<T>>;

/// Shared, type-erased upstream of a chain.
pub type Source<T> = Rc<dyn ValueModel<T>>;

/// Read/write value cell with change notification.
pub trait ValueModel<T: 'static> {
    /// Current value.
    fn value(&self) -> Option<T>;

    /// Write a value. Writing an equal value is a silent no-op.
    fn set_value(&self, value: Option<T>) -> Result<(), BindingError>;

    /// Register a listener for value changes.
    fn subscribe_value(&self, listener: Box<dyn Fn(&ValueChange<T>)>) -> Subscription;

    /// Validate a candidate value without writing it.
    fn validate_value(
        &self,
        _value: Option<&T>,
        _result: &mut dyn ValidationResult,
    ) -> Result<(), ValidationFailure> {
        Ok(())
    }

    /// Whether [`ValueModel::validate_value`] can report anything.
    fn is_validating(&self) -> bool {
        false
    }

    /// Register a closure for value changes.
    fn on_change(&self, listener: impl Fn(&ValueChange<T>) + 'static) -> Subscription
    where
        Self: Sized,
    {
        self.subscribe_value(Box::new(listener))
    }

    /// Erase the concrete type for use as a chain source.
    fn into_source(self) -> Source<T>
    where
        Self: Sized + 'static,
    {
        Rc::new(self)
    }
}

type Vetoer<T> = Box<dyn Fn(&ValueChange<T>) -> Result<(), String>>;
type Hook<T> = Box<dyn Fn(&ValueChange<T>)>;

struct BindingInner<T: 'static> {
    value: RefCell<Option<T>>,
    nullable: bool,
    equality: Equality<T>,
    validator: Option<Rc<dyn Validator<T>>>,
    vetoers: Option<RefCell<Vec<Weak<Vetoer<T>>>>>,
    hook: Option<Hook<T>>,
    changes: ChangeEmitter<ValueChange<T>>,
}

/// Plain observable value cell.
///
/// Cloning yields another handle to the same cell.
pub struct Binding<T: 'static> {
    inner: Rc<BindingInner<T>>,
}

impl<T: 'static> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + fmt::Debug + 'static> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("value", &*self.inner.value.borrow())
            .field("nullable", &self.inner.nullable)
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Binding<T> {
    /// A non-nullable binding holding `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        BindingBuilder::new().build(Some(value))
    }

    /// A nullable binding, possibly starting absent.
    #[must_use]
    pub fn nullable(value: Option<T>) -> Self {
        BindingBuilder::new().nullable(true).build(value)
    }

    #[must_use]
    pub fn builder() -> BindingBuilder<T> {
        BindingBuilder::new()
    }

    /// Current value, cloned.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.inner.value.borrow().clone()
    }

    /// Read the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.inner.value.borrow().as_ref())
    }

    /// Write a present value.
    pub fn set(&self, value: T) -> Result<(), BindingError> {
        self.write(Some(value))
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.inner.nullable
    }

    #[must_use]
    pub fn has_veto_support(&self) -> bool {
        self.inner.vetoers.is_some()
    }

    /// Register a closure for value changes.
    pub fn subscribe(&self, callback: impl Fn(&ValueChange<T>) + 'static) -> Subscription {
        self.inner.changes.subscribe(callback)
    }

    /// Number of live value listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.changes.listener_count()
    }

    /// Fire a notification for the current value even though it did not
    /// change, so that listeners re-read it.
    pub fn force_notify(&self) {
        let current = self.get();
        self.inner.changes.notify(VALUE, current.clone(), current);
    }

    /// Register a vetoer. Fails if the binding was built without veto support.
    pub fn add_vetoer(
        &self,
        vetoer: impl Fn(&ValueChange<T>) -> Result<(), String> + 'static,
    ) -> Result<Subscription, BindingError> {
        let Some(vetoers) = &self.inner.vetoers else {
            return Err(BindingError::IllegalState("veto support not configured"));
        };
        let strong: Rc<Vetoer<T>> = Rc::new(Box::new(vetoer));
        vetoers.borrow_mut().push(Rc::downgrade(&strong));
        Ok(Subscription::holding(strong))
    }

    /// Write through the vetoers: any rejection leaves the value untouched.
    pub fn set_value_vetoable(&self, value: Option<T>) -> Result<(), BindingError> {
        let Some(vetoers) = &self.inner.vetoers else {
            return Err(BindingError::IllegalState("veto support not configured"));
        };
        self.check_nullable(&value)?;
        let current = self.get();
        if self.inner.equality.equal(&current, &value) {
            return Ok(());
        }
        let snapshot: Vec<Rc<Vetoer<T>>> = {
            let mut vetoers = vetoers.borrow_mut();
            vetoers.retain(|weak| weak.strong_count() > 0);
            vetoers.iter().filter_map(Weak::upgrade).collect()
        };
        let proposed = PropertyChange::new(VALUE, current, value);
        for vetoer in &snapshot {
            vetoer(&proposed).map_err(|reason| {
                tracing::debug!(%reason, "binding write vetoed");
                BindingError::Vetoed { reason }
            })?;
        }
        self.write(proposed.new)
    }

    fn check_nullable(&self, value: &Option<T>) -> Result<(), BindingError> {
        if value.is_none() && !self.inner.nullable {
            return Err(BindingError::InvalidArgument(
                "non-nullable binding cannot hold an absent value",
            ));
        }
        Ok(())
    }

    fn write(&self, value: Option<T>) -> Result<(), BindingError> {
        self.check_nullable(&value)?;
        let change = {
            let mut slot = self.inner.value.borrow_mut();
            if self.inner.equality.equal(&slot, &value) {
                return Ok(());
            }
            let old = std::mem::replace(&mut *slot, value);
            PropertyChange::new(VALUE, old, slot.clone())
        };
        if let Some(hook) = &self.inner.hook {
            hook(&change);
        }
        self.inner.changes.emit(&change);
        Ok(())
    }
}

impl<T: Clone + PartialEq + 'static> ValueModel<T> for Binding<T> {
    fn value(&self) -> Option<T> {
        self.get()
    }

    fn set_value(&self, value: Option<T>) -> Result<(), BindingError> {
        self.write(value)
    }

    fn subscribe_value(&self, listener: Box<dyn Fn(&ValueChange<T>)>) -> Subscription {
        self.inner.changes.subscribe_boxed(listener)
    }

    fn validate_value(
        &self,
        value: Option<&T>,
        result: &mut dyn ValidationResult,
    ) -> Result<(), ValidationFailure> {
        match &self.inner.validator {
            Some(validator) => validator.validate(value, result),
            None => Ok(()),
        }
    }

    fn is_validating(&self) -> bool {
        self.inner.validator.is_some()
    }
}

/// Configuration for a [`Binding`].
pub struct BindingBuilder<T: 'static> {
    nullable: bool,
    equality: Equality<T>,
    validator: Option<Rc<dyn Validator<T>>>,
    veto_support: bool,
    hook: Option<Hook<T>>,
}

impl<T: Clone + PartialEq + 'static> BindingBuilder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nullable: false,
            equality: Equality::Value,
            validator: None,
            veto_support: false,
            hook: None,
        }
    }

    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

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

    /// Enable [`Binding::add_vetoer`] and [`Binding::set_value_vetoable`].
    #[must_use]
    pub fn veto_support(mut self, enabled: bool) -> Self {
        self.veto_support = enabled;
        self
    }

    /// Run `hook` on every actual change, before listeners are notified.
    #[must_use]
    pub fn on_changed(mut self, hook: impl Fn(&ValueChange<T>) + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Build the binding. An absent initial value implies `nullable`.
    #[must_use]
    pub fn build(self, initial: Option<T>) -> Binding<T> {
        let nullable = self.nullable || initial.is_none();
        Binding {
            inner: Rc::new(BindingInner {
                value: RefCell::new(initial),
                nullable,
                equality: self.equality,
                validator: self.validator,
                vetoers: self.veto_support.then(|| RefCell::new(Vec::new())),
                hook: self.hook,
                changes: ChangeEmitter::new(),
            }),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Default for BindingBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
