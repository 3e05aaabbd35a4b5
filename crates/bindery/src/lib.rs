#![forbid(unsafe_code)]

//! Bindery public facade.
//!
//! # Role in Bindery
//! This crate is the user-facing entry point. It re-exports the core
//! building blocks so applications can depend on a single crate:
//!
//! - `bindery-core` (as `primitives`): change emitters, subscriptions,
//!   equality modes.
//! - `bindery-validation`: messages, result sinks, validators.
//! - `bindery-binding`: bindings, chains, converters, buffers.
//! - `bindery-model`: presentation models (feature `model`, on by default).
//!
//! # How it fits in the system
//! Use [`prelude`] for the common types, or reach into a sub-crate through
//! the module re-exports when you need the full API.

pub use bindery_binding as binding;
pub use bindery_core as primitives;
#[cfg(feature = "model")]
pub use bindery_model as model;
pub use bindery_validation as validation;

pub use bindery_binding::{
    Binding, BindingError, Buffer, BufferGroup, BufferedBinding, ChainedBinding, ConversionError,
    ConverterBinding, ValueModel,
};
pub use bindery_core::{ChangeEmitter, Equality, PropertyChange, Subscription};
#[cfg(feature = "model")]
pub use bindery_model::{BindingAdapter, ModelConfig, PresentationModel, ValidationAdapter};
pub use bindery_validation::{Message, MessageSet, Severity, ValidationFailure, Validator};

/// Convenience result alias for binding operations.
pub type Result<T, E = BindingError> = std::result::Result<T, E>;

/// Common imports for applications.
pub mod prelude {
    pub use bindery_binding::{
        AsBuffer, Binding, BindingError, Buffer, BufferGroup, BufferGroupConfig,
        BufferedBinding, ChainedBinding, Converter, ConverterBinding, ParseConverter,
        PropertyAccessor, Source, ValueChange, ValueModel, converter,
    };
    pub use bindery_core::{Equality, PropertyChange, Subscription};
    #[cfg(feature = "model")]
    pub use bindery_model::{BindingAdapter, ModelConfig, PresentationModel, ValidationAdapter};
    pub use bindery_validation::{
        AndValidator, CollectingValidationResult, Message, MessageSet, OrValidator, Predicate,
        Range, Required, Severity, ValidationResult, Validator, from_fn,
    };
}
