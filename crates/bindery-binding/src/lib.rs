#![forbid(unsafe_code)]

//! Value bindings and write buffering for Bindery.
//!
//! # Role in Bindery
//! `bindery-binding` is the value layer. Every stage implements
//! [`ValueModel`], so stages compose bottom-up:
//!
//! ```text
//! Binding<S> -> ConverterBinding<S, T> -> BufferedBinding<T> -> BufferGroup
//! ```
//!
//! Values flow up through change notifications; `commit` and `flush` flow
//! down from the group to each buffer and from there to its source.
//!
//! # Primary responsibilities
//! - **Binding**: plain observable cell with nullability, equality mode,
//!   validator, vetoers and a value-changed hook.
//! - **ChainedBinding**: derives its value from a replaceable source through
//!   a [`Derive`] strategy ([`PropertyAccessor`], converters).
//! - **ConverterBinding**: bidirectional conversion that reports conversion
//!   failures as validation errors.
//! - **BufferedBinding / BufferGroup**: edit buffering with a `buffering`
//!   flag, grouped commit and flush.

pub mod buffer;
pub mod chained;
pub mod converter;
pub mod error;
pub mod group;
pub mod value;

pub use buffer::{
    AsBuffer, BUFFERING, Buffer, BufferId, BufferedBinding, BufferedBindingBuilder,
};
pub use chained::{ChainedBinding, Derive, PropertyAccessor, Refresh, SourceChanged, Write};
pub use converter::{Converter, ConverterBinding, FnConverter, ParseConverter, converter};
pub use error::{BindingError, ConversionError};
pub use group::{BufferGroup, BufferGroupConfig};
pub use value::{Binding, BindingBuilder, Source, VALUE, ValueChange, ValueModel};
