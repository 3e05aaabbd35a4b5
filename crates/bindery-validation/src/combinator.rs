#![forbid(unsafe_code)]

//! Validator combinators.
//!
//! - [`OrValidator`]: the value is acceptable if any branch accepts it.
//! - [`AndValidator`]: every branch reports into the same sink.
//!
//! # OrValidator semantics
//!
//! Each branch runs against a private collecting sink. A branch *passes* when
//! it produced nothing worse than a warning.
//!
//! 1. Branches run in order; the scan stops at the first passing branch
//!    unless `keep_warnings` is set, in which case later branches still run so
//!    their warnings can be collected.
//! 2. If no branch passed, every collected message (errors and warnings from
//!    all branches) is flushed into the caller's sink.
//! 3. If any branch passed, only warnings are flushed; errors from failing
//!    branches are suppressed.
//! 4. An empty `OrValidator` reports nothing.

use std::fmt;
use std::rc::Rc;

use crate::error::ValidationFailure;
use crate::message::Severity;
use crate::result::{CollectingValidationResult, ValidationResult};
use crate::validator::Validator;

/// Accepts a value if at least one branch accepts it.
pub struct OrValidator<T: ?Sized> {
    validators: Vec<Rc<dyn Validator<T>>>,
    keep_warnings: bool,
}

impl<T: ?Sized> OrValidator<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
            keep_warnings: false,
        }
    }

    /// Keep scanning past the first passing branch to collect warnings.
    #[must_use]
    pub fn keep_warnings(mut self, keep: bool) -> Self {
        self.keep_warnings = keep;
        self
    }

    /// Append a branch. Adding the same `Rc` twice is a no-op.
    #[must_use]
    pub fn with(mut self, validator: Rc<dyn Validator<T>>) -> Self {
        self.push(validator);
        self
    }

    /// Append a branch. Returns `false` if it was already present.
    pub fn push(&mut self, validator: Rc<dyn Validator<T>>) -> bool {
        if self.validators.iter().any(|v| Rc::ptr_eq(v, &validator)) {
            return false;
        }
        self.validators.push(validator);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl<T: ?Sized> Default for OrValidator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for OrValidator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrValidator")
            .field("validators", &self.validators.len())
            .field("keep_warnings", &self.keep_warnings)
            .finish()
    }
}

impl<T: ?Sized> Validator<T> for OrValidator<T> {
    fn validate(
        &self,
        value: Option<&T>,
        result: &mut dyn ValidationResult,
    ) -> Result<(), ValidationFailure> {
        let mut branches = Vec::with_capacity(self.validators.len());
        let mut passed = false;

        for validator in &self.validators {
            let mut branch = CollectingValidationResult::new();
            validator.validate(value, &mut branch)?;
            let branch_passed = branch.max_severity() < Some(Severity::Error);
            branches.push(branch);
            if branch_passed {
                passed = true;
                if !self.keep_warnings {
                    break;
                }
            }
        }

        for branch in &branches {
            if passed {
                branch.flush_only(result, Severity::Warning)?;
            } else {
                branch.flush_into(result, Severity::Warning)?;
            }
        }
        Ok(())
    }
}

/// Runs every branch into the caller's sink.
///
/// A throwing sink ends the pass at the first failure, so later branches do
/// not run.
pub struct AndValidator<T: ?Sized> {
    validators: Vec<Rc<dyn Validator<T>>>,
}

impl<T: ?Sized> AndValidator<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, validator: Rc<dyn Validator<T>>) -> Self {
        self.validators.push(validator);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl<T: ?Sized> Default for AndValidator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for AndValidator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AndValidator")
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl<T: ?Sized> Validator<T> for AndValidator<T> {
    fn validate(
        &self,
        value: Option<&T>,
        result: &mut dyn ValidationResult,
    ) -> Result<(), ValidationFailure> {
        for validator in &self.validators {
            validator.validate(value, result)?;
        }
        Ok(())
    }
}
