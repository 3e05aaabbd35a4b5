#![forbid(unsafe_code)]

//! Presentation models for Bindery.
//!
//! A [`PresentationModel`] is the one object a screen asks "is my data valid"
//! and "has it been edited". Bindings added to it join its buffer group;
//! [`ValidationAdapter`]s added to it feed a per-subject message map from
//! which the error and warning counts are derived.
//!
//! [`PresentationModel::commit_data`] is all-or-nothing at the model level:
//! it validates, and commits the buffer group only when no errors remain.

pub mod adapter;
pub mod config;
pub mod model;

pub use adapter::{BindingAdapter, ValidationAdapter};
#[cfg(feature = "toml-config")]
pub use config::ConfigError;
pub use config::ModelConfig;
pub use model::{ERROR_COUNT, PresentationModel, VALID, WARNING_COUNT};
