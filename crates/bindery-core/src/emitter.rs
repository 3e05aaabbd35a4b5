#![forbid(unsafe_code)]

//! Synchronous change notification.
//!
//! A [`ChangeEmitter<E>`] fans an event out to every registered listener,
//! in registration order, on the calling thread. Listeners are held weakly by
//! the emitter and strongly by the [`Subscription`] returned from
//! [`ChangeEmitter::subscribe`]; dropping the subscription unsubscribes.
//!
//! # Invariants
//!
//! 1. Listeners are invoked in registration order.
//! 2. Dispatch works on a snapshot taken when [`ChangeEmitter::emit`] starts:
//!    listeners added during dispatch are not called for that event, and
//!    listeners removed during dispatch still receive it exactly once.
//! 3. No internal borrow is held while a listener runs, so listeners may
//!    subscribe, unsubscribe, or emit re-entrantly.
//! 4. Dead listeners are pruned lazily at the start of each dispatch.
//!
//! # Failure Modes
//!
//! - Listener panic: propagates to the caller of `emit()`; later listeners in
//!   the snapshot are not called.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<E> = Box<dyn Fn(&E)>;

/// A named property transition, carried by value-change notifications.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyChange<T> {
    /// Name of the property that changed (e.g. `"value"`, `"buffering"`).
    pub property: &'static str,
    /// Value before the change.
    pub old: T,
    /// Value after the change.
    pub new: T,
}

impl<T> PropertyChange<T> {
    /// Create a change record.
    #[must_use]
    pub fn new(property: &'static str, old: T, new: T) -> Self {
        Self { property, old, new }
    }
}

/// Ordered listener list with snapshot dispatch.
///
/// Cloning an emitter yields another handle to the same listener list.
pub struct ChangeEmitter<E: 'static> {
    listeners: Rc<RefCell<Vec<Weak<Callback<E>>>>>,
}

impl<E: 'static> Clone for ChangeEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: Rc::clone(&self.listeners),
        }
    }
}

impl<E: 'static> Default for ChangeEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> fmt::Debug for ChangeEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeEmitter")
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

impl<E: 'static> ChangeEmitter<E> {
    /// Create an emitter with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Register `callback`. The callback stays registered for as long as the
    /// returned [`Subscription`] is alive.
    pub fn subscribe(&self, callback: impl Fn(&E) + 'static) -> Subscription {
        self.subscribe_boxed(Box::new(callback))
    }

    /// Register an already boxed callback.
    ///
    /// This is the object-safe entry point used by trait methods that cannot
    /// take `impl Fn`.
    pub fn subscribe_boxed(&self, callback: Box<dyn Fn(&E)>) -> Subscription {
        let strong: Rc<Callback<E>> = Rc::new(callback);
        self.listeners.borrow_mut().push(Rc::downgrade(&strong));
        Subscription {
            guard: Some(strong),
        }
    }

    /// Number of live listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Whether any listener is currently registered.
    #[must_use]
    pub fn has_listeners(&self) -> bool {
        self.listener_count() > 0
    }

    /// Deliver `event` to a snapshot of the current listeners.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Rc<Callback<E>>> = {
            let mut listeners = self.listeners.borrow_mut();
            listeners.retain(|weak| weak.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        if snapshot.is_empty() {
            return;
        }
        tracing::trace!(listeners = snapshot.len(), "dispatching change");
        for callback in &snapshot {
            callback(event);
        }
    }
}

impl<T: 'static> ChangeEmitter<PropertyChange<T>> {
    /// Fire a [`PropertyChange`] for `property`.
    ///
    /// No equality check happens here: callers decide whether `old` and `new`
    /// differ enough to notify.
    pub fn notify(&self, property: &'static str, old: T, new: T) {
        self.emit(&PropertyChange { property, old, new });
    }
}

/// RAII guard for a registered listener.
///
/// Dropping the subscription (or calling [`Subscription::unsubscribe`])
/// removes the listener before the next dispatch.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    guard: Option<Rc<dyn Any>>,
}

impl Subscription {
    /// A subscription that holds nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self { guard: None }
    }

    /// Wrap the strong half of a weakly-registered listener.
    ///
    /// For listener lists other than [`ChangeEmitter`] that follow the same
    /// "registry holds `Weak`, subscriber holds `Rc`" scheme.
    #[must_use]
    pub fn holding(guard: Rc<dyn Any>) -> Self {
        Self { guard: Some(guard) }
    }

    /// Whether this subscription still keeps a listener alive.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.guard.is_some()
    }

    /// Explicitly unsubscribe.
    pub fn unsubscribe(mut self) {
        self.guard = None;
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
