#![forbid(unsafe_code)]

//! Change-detection equality.
//!
//! Every value cell decides "did this write change anything?" through an
//! [`Equality`]. The default, [`Equality::Value`], is `PartialEq`, which is
//! already element-wise (deep) for `Vec`, arrays, and slices. Cells holding
//! shared buffers such as `Rc<[u8]>` can opt into [`Equality::pointer`] to
//! compare by identity instead.

use std::fmt;
use std::rc::Rc;

/// Comparator used for change suppression and dirty tracking.
pub enum Equality<T> {
    /// `PartialEq` equality.
    Value,
    /// Caller-supplied comparator.
    Custom(Rc<dyn Fn(&T, &T) -> bool>),
}

impl<T> Clone for Equality<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Value => Self::Value,
            Self::Custom(f) => Self::Custom(Rc::clone(f)),
        }
    }
}

impl<T> Default for Equality<T> {
    fn default() -> Self {
        Self::Value
    }
}

impl<T> fmt::Debug for Equality<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value => f.write_str("Equality::Value"),
            Self::Custom(_) => f.write_str("Equality::Custom(..)"),
        }
    }
}

impl<T: PartialEq> Equality<T> {
    /// Wrap a custom comparator.
    #[must_use]
    pub fn custom(f: impl Fn(&T, &T) -> bool + 'static) -> Self {
        Self::Custom(Rc::new(f))
    }

    /// Compare two present values.
    #[must_use]
    pub fn values_equal(&self, a: &T, b: &T) -> bool {
        match self {
            Self::Value => a == b,
            Self::Custom(f) => f(a, b),
        }
    }

    /// Compare two possibly absent values. Two absent values are equal; an
    /// absent value never equals a present one.
    #[must_use]
    pub fn equal(&self, a: &Option<T>, b: &Option<T>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => self.values_equal(a, b),
            _ => false,
        }
    }
}

impl<U: ?Sized + PartialEq + 'static> Equality<Rc<U>> {
    /// Identity comparison for shared values.
    #[must_use]
    pub fn pointer() -> Self {
        Self::Custom(Rc::new(|a: &Rc<U>, b: &Rc<U>| Rc::ptr_eq(a, b)))
    }
}
