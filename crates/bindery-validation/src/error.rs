use thiserror::Error;

use crate::message::Message;

/// A validation pass that was cut short by its sink.
///
/// Collecting sinks never produce this; only the throwing and no-op sinks do.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    /// A throwing sink received a message at or above its threshold.
    #[error("validation failed: {0}")]
    Raised(Message),
    /// A message was added where no validation was expected.
    #[error("unexpected validation message: {0}")]
    Unexpected(Message),
}

impl ValidationFailure {
    /// The message that triggered the failure.
    #[must_use]
    pub fn message(&self) -> &Message {
        match self {
            Self::Raised(message) | Self::Unexpected(message) => message,
        }
    }
}
