#![forbid(unsafe_code)]

//! Validation result sinks.
//!
//! A validator writes its findings into a [`ValidationResult`]. The sink
//! decides what an addition means:
//!
//! | Sink | On `add` |
//! |------|----------|
//! | [`NoValidation`] | always fails with [`ValidationFailure::Unexpected`] |
//! | [`CollectingValidationResult`] | stores the message |
//! | [`ThrowingValidationResult`] | fails on errors (and warnings if configured) |
//! | [`DefaultValidationResult`](crate::DefaultValidationResult) | stores, then diffs on `finish` |
//!
//! Validators must not assume a particular sink: propagate the `Result` of
//! every `add` with `?`.

use crate::error::ValidationFailure;
use crate::message::{Message, MessageSet, Severity};

/// Sink for the messages produced by one validation pass.
pub trait ValidationResult {
    /// Record `message`. A sink may reject it, ending the pass.
    fn add(&mut self, message: Message) -> Result<(), ValidationFailure>;

    /// Highest severity seen so far, including messages a sink dropped.
    fn max_severity(&self) -> Option<Severity>;

    /// Record an error with `text`.
    fn error(&mut self, text: &str) -> Result<(), ValidationFailure> {
        self.add(Message::error(text))
    }

    /// Record a warning with `text`.
    fn warning(&mut self, text: &str) -> Result<(), ValidationFailure> {
        self.add(Message::warning(text))
    }

    /// Whether an error has been seen.
    fn has_errors(&self) -> bool {
        self.max_severity() == Some(Severity::Error)
    }
}

/// Placeholder sink for "no validation expected here".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoValidation;

/// Canonical no-op sink.
pub const NO_VALIDATION: NoValidation = NoValidation;

impl ValidationResult for NoValidation {
    fn add(&mut self, message: Message) -> Result<(), ValidationFailure> {
        Err(ValidationFailure::Unexpected(message))
    }

    fn max_severity(&self) -> Option<Severity> {
        None
    }
}

/// Sink that keeps every message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectingValidationResult {
    messages: MessageSet,
}

impl CollectingValidationResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn messages(&self) -> &MessageSet {
        &self.messages
    }

    #[must_use]
    pub fn into_messages(self) -> MessageSet {
        self.messages
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Copy messages at `severity` or above into `target`.
    pub fn flush_into(
        &self,
        target: &mut dyn ValidationResult,
        at_least: Severity,
    ) -> Result<(), ValidationFailure> {
        for message in self.messages.iter().filter(|m| m.severity() >= at_least) {
            target.add(message.clone())?;
        }
        Ok(())
    }

    /// Copy only messages at exactly `severity` into `target`.
    pub fn flush_only(
        &self,
        target: &mut dyn ValidationResult,
        severity: Severity,
    ) -> Result<(), ValidationFailure> {
        for message in self.messages.iter().filter(|m| m.severity() == severity) {
            target.add(message.clone())?;
        }
        Ok(())
    }
}

impl ValidationResult for CollectingValidationResult {
    fn add(&mut self, message: Message) -> Result<(), ValidationFailure> {
        self.messages.insert(message);
        Ok(())
    }

    fn max_severity(&self) -> Option<Severity> {
        crate::message::max_severity(&self.messages)
    }
}

/// Sink that turns the first blocking message into a failure.
///
/// Errors always fail. Warnings fail only with `throw_on_warning`; otherwise
/// they are dropped, but still count toward [`ValidationResult::max_severity`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThrowingValidationResult {
    throw_on_warning: bool,
    max: Option<Severity>,
}

/// Canonical throw-on-error sink: warnings are dropped, errors fail.
pub const THROW_ON_ERROR: ThrowingValidationResult = ThrowingValidationResult::new();

impl ThrowingValidationResult {
    /// Fail on errors only.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            throw_on_warning: false,
            max: None,
        }
    }

    /// Fail on warnings as well as errors.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            throw_on_warning: true,
            max: None,
        }
    }

    #[must_use]
    pub const fn throws_on_warning(&self) -> bool {
        self.throw_on_warning
    }
}

impl ValidationResult for ThrowingValidationResult {
    fn add(&mut self, message: Message) -> Result<(), ValidationFailure> {
        let severity = message.severity();
        self.max = self.max.max(Some(severity));
        let throws = match severity {
            Severity::Error => true,
            Severity::Warning => self.throw_on_warning,
        };
        if throws {
            return Err(ValidationFailure::Raised(message));
        }
        Ok(())
    }

    fn max_severity(&self) -> Option<Severity> {
        self.max
    }
}
