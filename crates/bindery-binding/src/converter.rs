#![forbid(unsafe_code)]

//! Bidirectional converters and the [`ConverterBinding`] stage.
//!
//! Reading maps the source's `S` to a `T` with
//! [`Converter::source_to_target`]; writing maps back with
//! [`Converter::target_to_source`] and forwards the result to the source.
//!
//! Validation crosses the boundary: a candidate `T` that cannot be converted
//! back is reported as one error message, and one that can is handed to the
//! source's own validation as an `S`.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::str::FromStr;

use bindery_core::Subscription;
use bindery_validation::{Message, ValidationFailure, ValidationResult, Validator};

use crate::chained::{ChainedBinding, Derive, SourceChanged, Write};
use crate::error::{BindingError, ConversionError};
use crate::value::{Source, ValueChange, ValueModel};

/// Maps values between a source type `S` and a target type `T`.
pub trait Converter<S, T> {
    fn source_to_target(&self, source: &S) -> Result<T, ConversionError>;
    fn target_to_source(&self, target: &T) -> Result<S, ConversionError>;
}

/// A converter built from two closures.
pub struct FnConverter<F, B> {
    forward: F,
    backward: B,
}

/// Build a [`Converter`] from a forward and a backward mapping.
pub fn converter<S, T, F, B>(forward: F, backward: B) -> FnConverter<F, B>
where
    F: Fn(&S) -> Result<T, ConversionError>,
    B: Fn(&T) -> Result<S, ConversionError>,
{
    FnConverter { forward, backward }
}

impl<S, T, F, B> Converter<S, T> for FnConverter<F, B>
where
    F: Fn(&S) -> Result<T, ConversionError>,
    B: Fn(&T) -> Result<S, ConversionError>,
{
    fn source_to_target(&self, source: &S) -> Result<T, ConversionError> {
        (self.forward)(source)
    }

    fn target_to_source(&self, target: &T) -> Result<S, ConversionError> {
        (self.backward)(target)
    }
}

impl<F, B> fmt::Debug for FnConverter<F, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnConverter")
    }
}

/// Text editing for any `FromStr + Display` value.
///
/// Input is trimmed before parsing.
pub struct ParseConverter<S> {
    _marker: PhantomData<fn() -> S>,
}

impl<S> ParseConverter<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<S> Default for ParseConverter<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for ParseConverter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParseConverter<{}>", std::any::type_name::<S>())
    }
}

impl<S> Converter<S, String> for ParseConverter<S>
where
    S: FromStr + fmt::Display,
    S::Err: fmt::Display,
{
    fn source_to_target(&self, source: &S) -> Result<String, ConversionError> {
        Ok(source.to_string())
    }

    fn target_to_source(&self, target: &String) -> Result<S, ConversionError> {
        target
            .trim()
            .parse::<S>()
            .map_err(|err| ConversionError::new(format!("cannot parse {target:?}: {err}")))
    }
}

struct ConverterDerive<S, T> {
    converter: Rc<dyn Converter<S, T>>,
}

impl<S, T> Derive<S, T> for ConverterDerive<S, T> {
    fn derive(&self, source: &S) -> Option<T> {
        match self.converter.source_to_target(source) {
            Ok(target) => Some(target),
            Err(err) => {
                tracing::debug!(error = %err, "converter could not derive target value");
                None
            }
        }
    }

    fn write(&self, _source: &S, value: Option<T>) -> Result<Write<S>, BindingError> {
        match value {
            Some(target) => Ok(Write::Forward(Some(
                self.converter.target_to_source(&target)?,
            ))),
            None => Ok(Write::Forward(None)),
        }
    }
}

/// A chained binding that presents its source through a [`Converter`].
pub struct ConverterBinding<S: 'static, T: 'static> {
    chain: ChainedBinding<S, T>,
    converter: Rc<dyn Converter<S, T>>,
    validator: Option<Rc<dyn Validator<T>>>,
}

impl<S: 'static, T: 'static> Clone for ConverterBinding<S, T> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            converter: Rc::clone(&self.converter),
            validator: self.validator.clone(),
        }
    }
}

impl<S, T> fmt::Debug for ConverterBinding<S, T>
where
    S: Clone + 'static,
    T: Clone + PartialEq + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterBinding")
            .field("value", &self.chain.value())
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

impl<S, T> ConverterBinding<S, T>
where
    S: Clone + 'static,
    T: Clone + PartialEq + 'static,
{
    #[must_use]
    pub fn new(source: Source<S>, converter: impl Converter<S, T> + 'static) -> Self {
        Self::from_shared(Some(source), Rc::new(converter))
    }

    /// A converter stage with no source yet.
    #[must_use]
    pub fn detached(converter: impl Converter<S, T> + 'static) -> Self {
        Self::from_shared(None, Rc::new(converter))
    }

    fn from_shared(source: Option<Source<S>>, converter: Rc<dyn Converter<S, T>>) -> Self {
        let chain = ChainedBinding::new(ConverterDerive {
            converter: Rc::clone(&converter),
        });
        chain.set_source(source);
        Self {
            chain,
            converter,
            validator: None,
        }
    }

    /// Validate target values before they are converted back.
    #[must_use]
    pub fn with_validator(mut self, validator: Rc<dyn Validator<T>>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn set_source(&self, source: Option<Source<S>>) {
        self.chain.set_source(source);
    }

    #[must_use]
    pub fn source(&self) -> Option<Source<S>> {
        self.chain.source()
    }

    pub fn subscribe(&self, callback: impl Fn(&ValueChange<T>) + 'static) -> Subscription {
        self.chain.subscribe(callback)
    }

    pub fn subscribe_source(&self, callback: impl Fn(&SourceChanged) + 'static) -> Subscription {
        self.chain.subscribe_source(callback)
    }
}

impl<S, T> ValueModel<T> for ConverterBinding<S, T>
where
    S: Clone + 'static,
    T: Clone + PartialEq + 'static,
{
    fn value(&self) -> Option<T> {
        self.chain.value()
    }

    fn set_value(&self, value: Option<T>) -> Result<(), BindingError> {
        self.chain.set_value(value)
    }

    fn subscribe_value(&self, listener: Box<dyn Fn(&ValueChange<T>)>) -> Subscription {
        self.chain.subscribe_value(listener)
    }

    fn validate_value(
        &self,
        value: Option<&T>,
        result: &mut dyn ValidationResult,
    ) -> Result<(), ValidationFailure> {
        if let Some(validator) = &self.validator {
            validator.validate(value, result)?;
        }
        let converted = match value {
            Some(target) => match self.converter.target_to_source(target) {
                Ok(source) => Some(source),
                Err(err) => return result.add(Message::error(err.to_string())),
            },
            None => None,
        };
        match self.chain.source() {
            Some(source) if source.is_validating() => {
                source.validate_value(converted.as_ref(), result)
            }
            _ => Ok(()),
        }
    }

    fn is_validating(&self) -> bool {
        true
    }
}
