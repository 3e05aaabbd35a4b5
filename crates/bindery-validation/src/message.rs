#![forbid(unsafe_code)]

//! Severity-tagged validation findings.
//!
//! A [`Message`] is immutable and value-equal: two messages with the same
//! severity, text, and details are the same message for set membership and
//! diffing. [`MessageSet`] is ordered so that event payloads and test output
//! are deterministic.

use std::collections::BTreeSet;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How bad a finding is. `Warning < Error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Severity {
    /// Tolerable: the value can still be committed.
    Warning,
    /// Blocking: the value must not be committed.
    Error,
}

impl Severity {
    /// Uppercase label used in `Display` output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An immutable validation finding.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Message {
    severity: Severity,
    text: String,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    details: Option<String>,
}

impl Message {
    /// Create a message without details.
    #[must_use]
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
            details: None,
        }
    }

    /// Shorthand for an [`Severity::Error`] message.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Severity::Error, text)
    }

    /// Shorthand for a [`Severity::Warning`] message.
    #[must_use]
    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(Severity::Warning, text)
    }

    /// Attach free-form details. Details take part in equality.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.text)?;
        if let Some(details) = &self.details {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

/// Ordered, de-duplicated collection of messages.
pub type MessageSet = BTreeSet<Message>;

/// Highest severity present in `messages`, if any.
#[must_use]
pub fn max_severity<'a>(messages: impl IntoIterator<Item = &'a Message>) -> Option<Severity> {
    messages.into_iter().map(Message::severity).max()
}

/// Count `(errors, warnings)` in `messages`.
#[must_use]
pub fn count_by_severity<'a>(messages: impl IntoIterator<Item = &'a Message>) -> (usize, usize) {
    messages
        .into_iter()
        .fold((0, 0), |(errors, warnings), message| match message.severity {
            Severity::Error => (errors + 1, warnings),
            Severity::Warning => (errors, warnings + 1),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Warning < Severity::Error);
        assert_eq!(Severity::Error.to_string(), "ERROR");
    }

    #[test]
    fn messages_are_value_equal() {
        let a = Message::error("required").with_details("name");
        let b = Message::error("required").with_details("name");
        let c = Message::error("required");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: MessageSet = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn display_includes_details() {
        let m = Message::warning("looks odd").with_details("age > 120");
        assert_eq!(m.to_string(), "WARNING: looks odd (age > 120)");
        assert_eq!(Message::error("bad").to_string(), "ERROR: bad");
    }

    #[test]
    fn severity_helpers() {
        let messages = [
            Message::warning("w1"),
            Message::error("e1"),
            Message::warning("w2"),
        ];
        assert_eq!(max_severity(&messages), Some(Severity::Error));
        assert_eq!(count_by_severity(&messages), (1, 2));
        assert_eq!(max_severity(&Vec::<Message>::new()), None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_shape() {
        let m = Message::error("bad");
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"severity":"ERROR","text":"bad"}"#);
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
