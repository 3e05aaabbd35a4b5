#![forbid(unsafe_code)]

//! Thread-safe single-value cell.
//!
//! [`SharedValue<T>`] is the one primitive in this workspace that may be
//! touched from more than one thread. Reads are lock-free snapshots backed by
//! `arc-swap`; when the caller supplies a lock, both `get` and `set` run under
//! it so that a read-modify-write sequence in [`SharedValue::update`] is
//! atomic with respect to other holders of the same lock.
//!
//! The binding, buffer, and validation graph does not use this type: those
//! components are single-threaded and rely on `Rc`.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;

/// A value cell guarded by an optional user-supplied mutex.
pub struct SharedValue<T> {
    value: ArcSwap<T>,
    lock: Option<Arc<Mutex<()>>>,
}

impl<T> SharedValue<T> {
    /// Create an unguarded cell.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            value: ArcSwap::from_pointee(value),
            lock: None,
        }
    }

    /// Create a cell whose accesses are serialized by `lock`.
    ///
    /// Sharing one lock across several cells makes their updates mutually
    /// exclusive.
    #[must_use]
    pub fn with_lock(value: T, lock: Arc<Mutex<()>>) -> Self {
        Self {
            value: ArcSwap::from_pointee(value),
            lock: Some(lock),
        }
    }

    fn guard(&self) -> Option<MutexGuard<'_, ()>> {
        self.lock
            .as_ref()
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Snapshot of the current value.
    #[must_use]
    pub fn get(&self) -> Arc<T> {
        let _guard = self.guard();
        self.value.load_full()
    }

    /// Replace the value.
    pub fn set(&self, value: T) {
        let _guard = self.guard();
        self.value.store(Arc::new(value));
    }

    /// Replace the value with `f(current)`, returning the new snapshot.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Arc<T> {
        let _guard = self.guard();
        let next = Arc::new(f(&self.value.load()));
        self.value.store(Arc::clone(&next));
        next
    }

    /// Whether a lock was supplied.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedValue")
            .field("value", &**self.value.load())
            .field("locked", &self.is_locked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn get_and_set() {
        let cell = SharedValue::new(1);
        assert_eq!(*cell.get(), 1);
        cell.set(2);
        assert_eq!(*cell.get(), 2);
        assert!(!cell.is_locked());
    }

    #[test]
    fn locked_updates_are_not_lost() {
        let lock = Arc::new(Mutex::new(()));
        let cell = Arc::new(SharedValue::with_lock(0u64, lock));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    for _ in 0..250 {
                        cell.update(|v| v + 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*cell.get(), 1000);
    }

    #[test]
    fn debug_shows_value() {
        let cell = SharedValue::new("x");
        let debug = format!("{cell:?}");
        assert!(debug.contains("\"x\""));
    }
}
