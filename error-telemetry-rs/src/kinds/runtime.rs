//! Runtime failures.

use std::any::{type_name, Any};

/// A dynamically typed value was not of the expected type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("type assertion failed: value is not {expected}")]
pub struct TypeAssertionError {
    pub expected: &'static str,
}

impl TypeAssertionError {
    pub fn new<T: ?Sized>() -> Self {
        Self {
            expected: type_name::<T>(),
        }
    }
}

/// Downcasts a boxed value, failing with a [`TypeAssertionError`]
pub fn downcast<T: Any>(value: Box<dyn Any>) -> Result<Box<T>, TypeAssertionError> {
    value.downcast::<T>().map_err(|_| TypeAssertionError::new::<T>())
}
