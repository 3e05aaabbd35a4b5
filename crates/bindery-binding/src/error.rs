use bindery_validation::ValidationFailure;
use thiserror::Error;

/// A converter could not map a value across the conversion boundary.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConversionError {
    message: String,
}

impl ConversionError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Hard failures of binding operations.
///
/// Validation problems are normally reported as messages; they only show up
/// here when a caller chose a throwing sink.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BindingError {
    /// The caller passed a value the binding cannot hold.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The operation is not available in the binding's configuration.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),
    /// A vetoer rejected the change.
    #[error("change vetoed: {reason}")]
    Vetoed { reason: String },
    /// The binding has no write path.
    #[error("binding is read-only")]
    ReadOnly,
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
}
