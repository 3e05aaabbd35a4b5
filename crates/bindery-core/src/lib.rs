#![forbid(unsafe_code)]

//! Core primitives for Bindery.
//!
//! - [`ChangeEmitter`]: ordered, snapshot-dispatched listener list.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`PropertyChange`]: `(property, old, new)` notification payload.
//! - [`Equality`]: the comparator behind change suppression.
//! - [`SharedValue`]: the only thread-safe cell, guarded by an optional lock.
//!
//! Everything except [`SharedValue`] is single-threaded (`Rc`-based) and
//! dispatches synchronously on the calling thread.

pub mod emitter;
pub mod equality;
pub mod shared;

pub use emitter::{ChangeEmitter, PropertyChange, Subscription};
pub use equality::Equality;
pub use shared::SharedValue;
