//! # Structured Failure Kinds
//!
//! Failure types for categories where the standard library and the ecosystem
//! errors we depend on do not carry the payload telemetry needs (operation
//! names, addresses, paths, captured stderr and so on). Services construct these
//! at the boundary where the information is still available; the classifier
//! turns them into record fields.

pub mod fs;
pub mod net;
pub mod process;
pub mod proto;
pub mod runtime;
pub mod tls;

use std::error::Error as StdError;
use std::fmt;

/// A boxed failure that remembers the name of its concrete type.
///
/// Wrapper kinds such as [`net::OpError`] hold their inner failure as a
/// `Cause` so that an unrecognized inner failure can still be tagged with its
/// own type name.
pub struct Cause {
    error: Box<dyn StdError + Send + Sync>,
    type_name: &'static str,
}

impl Cause {
    /// Boxes `error`, recording its type name
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            error: Box::new(error),
            type_name: std::any::type_name::<E>(),
        }
    }

    /// The wrapped failure
    pub fn get_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.error.as_ref()
    }

    /// Fully qualified name of the wrapped failure's type
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Unwraps the boxed failure
    pub fn into_inner(self) -> Box<dyn StdError + Send + Sync> {
        self.error
    }
}

impl fmt::Debug for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.error, f)
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}
