#![forbid(unsafe_code)]

//! The validator contract and a few stock validators.
//!
//! A [`Validator<T>`] inspects a candidate value (absent values are passed as
//! `None`) and appends zero or more messages to a sink. Stock validators
//! other than [`Required`] let absent values through, so that "required" is
//! expressed once and composes with the rest.

use std::fmt;
use std::marker::PhantomData;

use crate::error::ValidationFailure;
use crate::message::Message;
use crate::result::ValidationResult;

/// Inspects a candidate value and reports findings into `result`.
pub trait Validator<T: ?Sized> {
    fn validate(
        &self,
        value: Option<&T>,
        result: &mut dyn ValidationResult,
    ) -> Result<(), ValidationFailure>;
}

/// Validator backed by a closure. Build with [`from_fn`].
pub struct FnValidator<T: ?Sized, F> {
    f: F,
    _marker: PhantomData<fn(&T)>,
}

/// Wrap a closure as a [`Validator`].
pub fn from_fn<T, F>(f: F) -> FnValidator<T, F>
where
    T: ?Sized,
    F: Fn(Option<&T>, &mut dyn ValidationResult) -> Result<(), ValidationFailure>,
{
    FnValidator {
        f,
        _marker: PhantomData,
    }
}

impl<T, F> Validator<T> for FnValidator<T, F>
where
    T: ?Sized,
    F: Fn(Option<&T>, &mut dyn ValidationResult) -> Result<(), ValidationFailure>,
{
    fn validate(
        &self,
        value: Option<&T>,
        result: &mut dyn ValidationResult,
    ) -> Result<(), ValidationFailure> {
        (self.f)(value, result)
    }
}

impl<T: ?Sized, F> fmt::Debug for FnValidator<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnValidator(..)")
    }
}

/// Rejects absent values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Required {
    message: Message,
}

impl Required {
    #[must_use]
    pub fn new(message: Message) -> Self {
        Self { message }
    }
}

impl Default for Required {
    fn default() -> Self {
        Self::new(Message::error("value is required"))
    }
}

impl<T: ?Sized> Validator<T> for Required {
    fn validate(
        &self,
        value: Option<&T>,
        result: &mut dyn ValidationResult,
    ) -> Result<(), ValidationFailure> {
        if value.is_none() {
            result.add(self.message.clone())?;
        }
        Ok(())
    }
}

/// Reports `message` when a present value fails `predicate`.
pub struct Predicate<T: ?Sized, F> {
    predicate: F,
    message: Message,
    _marker: PhantomData<fn(&T)>,
}

impl<T: ?Sized, F: Fn(&T) -> bool> Predicate<T, F> {
    #[must_use]
    pub fn new(predicate: F, message: Message) -> Self {
        Self {
            predicate,
            message,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized, F: Fn(&T) -> bool> Validator<T> for Predicate<T, F> {
    fn validate(
        &self,
        value: Option<&T>,
        result: &mut dyn ValidationResult,
    ) -> Result<(), ValidationFailure> {
        match value {
            Some(v) if !(self.predicate)(v) => result.add(self.message.clone()),
            _ => Ok(()),
        }
    }
}

impl<T: ?Sized, F> fmt::Debug for Predicate<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("message", &self.message)
            .finish()
    }
}

/// Inclusive bounds check. Either bound may be open.
#[derive(Clone, Debug, PartialEq)]
pub struct Range<T> {
    min: Option<T>,
    max: Option<T>,
}

impl<T: PartialOrd + fmt::Display> Range<T> {
    #[must_use]
    pub fn between(min: T, max: T) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    #[must_use]
    pub fn at_least(min: T) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    #[must_use]
    pub fn at_most(max: T) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }
}

impl<T: PartialOrd + fmt::Display> Validator<T> for Range<T> {
    fn validate(
        &self,
        value: Option<&T>,
        result: &mut dyn ValidationResult,
    ) -> Result<(), ValidationFailure> {
        let Some(value) = value else {
            return Ok(());
        };
        if let Some(min) = self.min.as_ref().filter(|min| value < *min) {
            result.add(Message::error(format!("must be at least {min}")))?;
        }
        if let Some(max) = self.max.as_ref().filter(|max| value > *max) {
            result.add(Message::error(format!("must be at most {max}")))?;
        }
        Ok(())
    }
}
