#![forbid(unsafe_code)]

//! Validation framework for Bindery.
//!
//! - [`Message`] / [`Severity`]: immutable, value-equal findings.
//! - [`ValidationResult`]: the sink validators write into, with the no-op,
//!   collecting, throwing, and diffing variants.
//! - [`Validator`]: the contract, plus [`OrValidator`] and [`AndValidator`].
//! - [`diff`] / [`ValidationChange`]: minimal change events between passes.

pub mod change;
pub mod combinator;
pub mod error;
pub mod message;
pub mod result;
pub mod validator;

pub use change::{DefaultValidationResult, MessageDiff, SubjectId, ValidationChange, diff};
pub use combinator::{AndValidator, OrValidator};
pub use error::ValidationFailure;
pub use message::{Message, MessageSet, Severity, count_by_severity, max_severity};
pub use result::{
    CollectingValidationResult, NO_VALIDATION, NoValidation, THROW_ON_ERROR,
    ThrowingValidationResult, ValidationResult,
};
pub use validator::{FnValidator, Predicate, Range, Required, Validator, from_fn};
