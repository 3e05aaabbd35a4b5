#![forbid(unsafe_code)]

//! Bindings derived from an upstream source.
//!
//! A [`ChainedBinding<S, T>`] reads a `T` out of whatever its source of type
//! `S` currently resolves to, and forwards writes back. How `T` is obtained
//! from `S` is a [`Derive`] strategy: a [`Converter`](crate::Converter)
//! maps values, a [`PropertyAccessor`] reaches into a shared object through a
//! getter/setter pair.
//!
//! # State machine
//!
//! *Source replaced* ([`ChainedBinding::set_source`]): unsubscribe from the
//! old source, detach from its resolved value, attach to the new resolved
//! value, subscribe to the new source, fire a [`SourceChanged`], then fire a
//! value change if the derived value before and after the swap differ.
//!
//! *Source value changed*: detach from the old resolved value and derive the
//! old target from it, attach to the new resolved value and derive the new
//! target, fire a value change if they differ.
//!
//! # Invariants
//!
//! 1. `value()` is `derive(source.value())` when both are present, otherwise
//!    `None`. The strategy is never called with an absent source value.
//! 2. Writes with no source, or with an absent source value, are dropped
//!    silently (`Ok(())`).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use bindery_core::{ChangeEmitter, Equality, Subscription};
use bindery_validation::{ValidationFailure, ValidationResult, Validator};

use crate::error::BindingError;
use crate::value::{Source, VALUE, ValueChange, ValueModel};

/// Callback a [`Derive::attach`] watcher invokes when the attached object
/// changed in place.
pub type Refresh = Rc<dyn Fn()>;

/// Outcome of [`Derive::write`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Write<S> {
    /// Store this value into the source binding.
    Forward(Option<S>),
    /// The write was applied to the resolved source object itself.
    Applied,
}

/// How a chain derives its value from a resolved source value.
pub trait Derive<S, T> {
    /// Read the target out of `source`.
    fn derive(&self, source: &S) -> Option<T>;

    /// Apply a target write against `source`.
    fn write(&self, source: &S, value: Option<T>) -> Result<Write<S>, BindingError>;

    /// Start watching `source` for in-place changes. The returned
    /// subscription is dropped on detach.
    fn attach(&self, _source: &S, _refresh: Refresh) -> Option<Subscription> {
        None
    }

    /// Called before the chain lets go of `source`.
    fn detach(&self, _source: &S) {}
}

/// Payload of source-replaced notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceChanged {
    pub had_source: bool,
    pub has_source: bool,
}

struct ChainState<S: 'static, T> {
    source: Option<Source<S>>,
    source_sub: Option<Subscription>,
    attachment: Option<Subscription>,
    last: Option<T>,
}

struct ChainedInner<S: 'static, T: 'static> {
    derive: Box<dyn Derive<S, T>>,
    equality: Equality<T>,
    validator: Option<Rc<dyn Validator<T>>>,
    state: RefCell<ChainState<S, T>>,
    value_changes: ChangeEmitter<ValueChange<T>>,
    source_changes: ChangeEmitter<SourceChanged>,
}

/// A binding whose value is derived from a source binding.
pub struct ChainedBinding<S: 'static, T: 'static> {
    inner: Rc<ChainedInner<S, T>>,
}

impl<S: 'static, T: 'static> Clone for ChainedBinding<S, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S, T> fmt::Debug for ChainedBinding<S, T>
where
    S: Clone + 'static,
    T: Clone + PartialEq + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedBinding")
            .field("value", &self.value())
            .field("has_source", &self.has_source())
            .finish()
    }
}

impl<S, T> ChainedBinding<S, T>
where
    S: Clone + 'static,
    T: Clone + PartialEq + 'static,
{
    /// A detached chain using `derive`.
    #[must_use]
    pub fn new(derive: impl Derive<S, T> + 'static) -> Self {
        Self::with_options(derive, Equality::Value, None)
    }

    /// A detached chain with explicit change detection and validator.
    #[must_use]
    pub fn with_options(
        derive: impl Derive<S, T> + 'static,
        equality: Equality<T>,
        validator: Option<Rc<dyn Validator<T>>>,
    ) -> Self {
        Self {
            inner: Rc::new(ChainedInner {
                derive: Box::new(derive),
                equality,
                validator,
                state: RefCell::new(ChainState {
                    source: None,
                    source_sub: None,
                    attachment: None,
                    last: None,
                }),
                value_changes: ChangeEmitter::new(),
                source_changes: ChangeEmitter::new(),
            }),
        }
    }

    /// A chain attached to `source`.
    #[must_use]
    pub fn bound(source: Source<S>, derive: impl Derive<S, T> + 'static) -> Self {
        let chain = Self::new(derive);
        chain.set_source(Some(source));
        chain
    }

    #[must_use]
    pub fn source(&self) -> Option<Source<S>> {
        self.inner.state.borrow().source.clone()
    }

    #[must_use]
    pub fn has_source(&self) -> bool {
        self.inner.state.borrow().source.is_some()
    }

    /// Register a closure for value changes.
    pub fn subscribe(&self, callback: impl Fn(&ValueChange<T>) + 'static) -> Subscription {
        self.inner.value_changes.subscribe(callback)
    }

    /// Register a closure for source replacement.
    pub fn subscribe_source(&self, callback: impl Fn(&SourceChanged) + 'static) -> Subscription {
        self.inner.source_changes.subscribe(callback)
    }

    /// Replace the source.
    pub fn set_source(&self, source: Option<Source<S>>) {
        let before = self.value();
        let (old_source, old_sub, old_attachment) = {
            let mut state = self.inner.state.borrow_mut();
            (
                state.source.take(),
                state.source_sub.take(),
                state.attachment.take(),
            )
        };
        drop(old_sub);
        drop(old_attachment);
        let had_source = old_source.is_some();
        if let Some(resolved) = old_source.and_then(|old| old.value()) {
            self.inner.derive.detach(&resolved);
        }

        let (attachment, source_sub) = match &source {
            Some(src) => {
                let attachment = src
                    .value()
                    .and_then(|resolved| self.inner.derive.attach(&resolved, self.refresh_handle()));
                let weak = Rc::downgrade(&self.inner);
                let sub = src.subscribe_value(Box::new(move |change: &ValueChange<S>| {
                    if let Some(inner) = weak.upgrade() {
                        ChainedBinding { inner }.source_value_changed(change);
                    }
                }));
                (attachment, Some(sub))
            }
            None => (None, None),
        };
        let has_source = source.is_some();
        {
            let mut state = self.inner.state.borrow_mut();
            state.source = source;
            state.source_sub = source_sub;
            state.attachment = attachment;
        }

        self.inner.source_changes.emit(&SourceChanged {
            had_source,
            has_source,
        });
        let after = self.value();
        self.inner.state.borrow_mut().last = after.clone();
        self.notify_if_changed(before, after);
    }

    /// Re-derive from the current source value and notify if the result moved.
    ///
    /// Used when the resolved source object changed in place.
    pub fn refresh(&self) {
        let current = self.value();
        let previous = std::mem::replace(&mut self.inner.state.borrow_mut().last, current.clone());
        self.notify_if_changed(previous, current);
    }

    fn refresh_handle(&self) -> Refresh {
        let weak = Rc::downgrade(&self.inner);
        Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                ChainedBinding { inner }.refresh();
            }
        })
    }

    fn source_value_changed(&self, change: &ValueChange<S>) {
        let derive = &self.inner.derive;
        let old_target = change.old.as_ref().and_then(|resolved| {
            derive.detach(resolved);
            derive.derive(resolved)
        });
        let old_attachment = self.inner.state.borrow_mut().attachment.take();
        drop(old_attachment);

        let attachment = change
            .new
            .as_ref()
            .and_then(|resolved| derive.attach(resolved, self.refresh_handle()));
        let new_target = change.new.as_ref().and_then(|resolved| derive.derive(resolved));
        {
            let mut state = self.inner.state.borrow_mut();
            state.attachment = attachment;
            state.last = new_target.clone();
        }
        self.notify_if_changed(old_target, new_target);
    }

    fn notify_if_changed(&self, old: Option<T>, new: Option<T>) {
        if !self.inner.equality.equal(&old, &new) {
            self.inner.value_changes.notify(VALUE, old, new);
        }
    }
}

impl<S, T> ValueModel<T> for ChainedBinding<S, T>
where
    S: Clone + 'static,
    T: Clone + PartialEq + 'static,
{
    fn value(&self) -> Option<T> {
        let source = self.source()?;
        let resolved = source.value()?;
        self.inner.derive.derive(&resolved)
    }

    fn set_value(&self, value: Option<T>) -> Result<(), BindingError> {
        let Some(source) = self.source() else {
            tracing::debug!("dropping write to chained binding without source");
            return Ok(());
        };
        let Some(resolved) = source.value() else {
            tracing::debug!("dropping write to chained binding with absent source value");
            return Ok(());
        };
        match self.inner.derive.write(&resolved, value)? {
            Write::Forward(next) => source.set_value(next),
            Write::Applied => {
                self.refresh();
                Ok(())
            }
        }
    }

    fn subscribe_value(&self, listener: Box<dyn Fn(&ValueChange<T>)>) -> Subscription {
        self.inner.value_changes.subscribe_boxed(listener)
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

type Getter<S, T> = Box<dyn Fn(&S) -> Option<T>>;
type Setter<S, T> = Box<dyn Fn(&S, Option<T>) -> Result<(), BindingError>>;
type Watch<S> = Box<dyn Fn(&S, Refresh) -> Subscription>;

/// Getter/setter pair reaching into a shared source object.
///
/// Without a setter the property is read-only and writes fail with
/// [`BindingError::ReadOnly`]. With a watch function, the chain re-derives
/// whenever the object reports an in-place change.
pub struct PropertyAccessor<S, T> {
    getter: Getter<S, T>,
    setter: Option<Setter<S, T>>,
    watch: Option<Watch<S>>,
}

impl<S, T> PropertyAccessor<S, T> {
    #[must_use]
    pub fn new(getter: impl Fn(&S) -> Option<T> + 'static) -> Self {
        Self {
            getter: Box::new(getter),
            setter: None,
            watch: None,
        }
    }

    #[must_use]
    pub fn with_setter(
        mut self,
        setter: impl Fn(&S, Option<T>) -> Result<(), BindingError> + 'static,
    ) -> Self {
        self.setter = Some(Box::new(setter));
        self
    }

    #[must_use]
    pub fn with_watch(mut self, watch: impl Fn(&S, Refresh) -> Subscription + 'static) -> Self {
        self.watch = Some(Box::new(watch));
        self
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.setter.is_none()
    }
}

impl<S, T> fmt::Debug for PropertyAccessor<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyAccessor")
            .field("read_only", &self.setter.is_none())
            .field("watched", &self.watch.is_some())
            .finish()
    }
}

impl<S, T> Derive<S, T> for PropertyAccessor<S, T> {
    fn derive(&self, source: &S) -> Option<T> {
        (self.getter)(source)
    }

    fn write(&self, source: &S, value: Option<T>) -> Result<Write<S>, BindingError> {
        let setter = self.setter.as_ref().ok_or(BindingError::ReadOnly)?;
        setter(source, value)?;
        Ok(Write::Applied)
    }

    fn attach(&self, source: &S, refresh: Refresh) -> Option<Subscription> {
        self.watch.as_ref().map(|watch| watch(source, refresh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Binding;
    use std::cell::Cell;

    /// Shared object with one observable property.
    struct Person {
        name: Binding<String>,
    }

    impl PartialEq for Person {
        fn eq(&self, other: &Self) -> bool {
            self.name.get() == other.name.get()
        }
    }

    fn person(name: &str) -> Rc<Person> {
        Rc::new(Person {
            name: Binding::new(name.to_string()),
        })
    }

    fn name_accessor() -> PropertyAccessor<Rc<Person>, String> {
        PropertyAccessor::new(|p: &Rc<Person>| p.name.get())
            .with_setter(|p: &Rc<Person>, v| p.name.set_value(v))
            .with_watch(|p: &Rc<Person>, refresh| p.name.subscribe(move |_| refresh()))
    }

    fn selection(initial: Option<Rc<Person>>) -> Binding<Rc<Person>> {
        Binding::<Rc<Person>>::builder()
            .nullable(true)
            .equality(Equality::pointer())
            .build(initial)
    }

    fn count_changes<T: Clone + PartialEq + 'static>(
        chain: &ChainedBinding<Rc<Person>, T>,
    ) -> (Rc<RefCell<Vec<ValueChange<T>>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let sub = chain.subscribe(move |c| l.borrow_mut().push(c.clone()));
        (log, sub)
    }

    #[test]
    fn derives_from_source() {
        let alice = person("alice");
        let selected = selection(Some(Rc::clone(&alice)));
        let chain = ChainedBinding::bound(selected.clone().into_source(), name_accessor());
        assert_eq!(chain.value(), Some("alice".to_string()));
    }

    #[test]
    fn absent_source_value_derives_none_and_drops_writes() {
        let selected = selection(None);
        let chain = ChainedBinding::bound(selected.into_source(), name_accessor());
        assert_eq!(chain.value(), None);
        chain.set_value(Some("ignored".to_string())).unwrap();
        assert_eq!(chain.value(), None);
    }

    #[test]
    fn detached_chain_drops_writes() {
        let chain: ChainedBinding<Rc<Person>, String> = ChainedBinding::new(name_accessor());
        assert!(!chain.has_source());
        chain.set_value(Some("x".to_string())).unwrap();
        assert_eq!(chain.value(), None);
    }

    #[test]
    fn source_value_change_rederives_once() {
        let alice = person("alice");
        let bob = person("bob");
        let selected = selection(Some(alice));
        let chain = ChainedBinding::bound(selected.clone().into_source(), name_accessor());
        let (log, _sub) = count_changes(&chain);

        selected.set(bob).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![ValueChange::new(
                VALUE,
                Some("alice".to_string()),
                Some("bob".to_string())
            )]
        );
    }

    #[test]
    fn same_derived_value_is_silent() {
        let selected = selection(Some(person("sam")));
        let chain = ChainedBinding::bound(selected.clone().into_source(), name_accessor());
        let (log, _sub) = count_changes(&chain);

        selected.set(person("sam")).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn in_place_change_refreshes_through_watch() {
        let alice = person("alice");
        let selected = selection(Some(Rc::clone(&alice)));
        let chain = ChainedBinding::bound(selected.into_source(), name_accessor());
        let (log, _sub) = count_changes(&chain);

        alice.name.set("alicia".to_string()).unwrap();
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(chain.value(), Some("alicia".to_string()));
    }

    #[test]
    fn write_applies_to_object_and_notifies_once() {
        let alice = person("alice");
        let selected = selection(Some(Rc::clone(&alice)));
        let chain = ChainedBinding::bound(selected.into_source(), name_accessor());
        let (log, _sub) = count_changes(&chain);

        chain.set_value(Some("al".to_string())).unwrap();
        assert_eq!(alice.name.get(), Some("al".to_string()));
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn detached_object_no_longer_refreshes() {
        let alice = person("alice");
        let bob = person("bob");
        let selected = selection(Some(Rc::clone(&alice)));
        let chain = ChainedBinding::bound(selected.clone().into_source(), name_accessor());
        selected.set(bob).unwrap();
        let (log, _sub) = count_changes(&chain);

        alice.name.set("changed".to_string()).unwrap();
        assert!(log.borrow().is_empty());
        assert_eq!(alice.name.listener_count(), 0);
    }

    #[test]
    fn replacing_source_fires_source_then_value() {
        let first = selection(Some(person("one")));
        let second = selection(Some(person("two")));
        let chain = ChainedBinding::bound(first.clone().into_source(), name_accessor());

        let order = Rc::new(RefCell::new(Vec::new()));
        let o = Rc::clone(&order);
        let _s1 = chain.subscribe_source(move |c| o.borrow_mut().push(format!("source {c:?}")));
        let o = Rc::clone(&order);
        let _s2 = chain.subscribe(move |c| o.borrow_mut().push(format!("value {:?}", c.new)));

        chain.set_source(Some(second.clone().into_source()));
        let order = order.borrow();
        assert_eq!(order.len(), 2);
        assert!(order[0].starts_with("source"));
        assert_eq!(order[1], "value Some(\"two\")");

        // Old source is unsubscribed.
        assert_eq!(first.listener_count(), 0);
    }

    #[test]
    fn replacing_source_with_same_value_fires_source_only() {
        let a = selection(Some(person("same")));
        let b = selection(Some(person("same")));
        let chain = ChainedBinding::bound(a.into_source(), name_accessor());
        let values = Rc::new(Cell::new(0));
        let sources = Rc::new(Cell::new(0));
        let v = Rc::clone(&values);
        let _s1 = chain.subscribe(move |_| v.set(v.get() + 1));
        let s = Rc::clone(&sources);
        let _s2 = chain.subscribe_source(move |_| s.set(s.get() + 1));

        chain.set_source(Some(b.into_source()));
        assert_eq!(sources.get(), 1);
        assert_eq!(values.get(), 0);
    }

    #[test]
    fn clearing_source_derives_none() {
        let selected = selection(Some(person("x")));
        let chain = ChainedBinding::bound(selected.into_source(), name_accessor());
        let (log, _sub) = count_changes(&chain);
        chain.set_source(None);
        assert_eq!(chain.value(), None);
        assert_eq!(log.borrow()[0].new, None);
    }

    #[test]
    fn read_only_accessor_rejects_writes() {
        let accessor = PropertyAccessor::new(|p: &Rc<Person>| p.name.get());
        assert!(accessor.is_read_only());
        let chain = ChainedBinding::bound(selection(Some(person("ro"))).into_source(), accessor);
        assert_eq!(
            chain.set_value(Some("nope".to_string())),
            Err(BindingError::ReadOnly)
        );
    }

    #[test]
    fn derive_never_sees_absent_source() {
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        let accessor = PropertyAccessor::new(move |p: &Rc<Person>| {
            c.set(c.get() + 1);
            p.name.get()
        });
        let selected = selection(None);
        let chain = ChainedBinding::bound(selected.clone().into_source(), accessor);
        assert_eq!(chain.value(), None);
        selected.set_value(None).unwrap();
        assert_eq!(calls.get(), 0);
    }
}
