#![forbid(unsafe_code)]

//! Presentation model options.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Options for a [`PresentationModel`](crate::PresentationModel).
///
/// With the `toml-config` feature the options can be loaded from a policy
/// file:
///
/// ```toml
/// skip_non_buffering = true
/// validate_before_commit = true
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ModelConfig {
    /// Commit and flush only the buffers that hold edits.
    pub skip_non_buffering: bool,
    /// Run every adapter before `commit_data` checks the error count.
    pub validate_before_commit: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            skip_non_buffering: false,
            validate_before_commit: true,
        }
    }
}

/// Failure to load a [`ModelConfig`].
#[cfg(feature = "toml-config")]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid model config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(feature = "toml-config")]
impl ModelConfig {
    /// Parse options from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }
}
