//! # Shared Types
//!
//! Field map alias, reserved key names and the crate's own error type.

use std::collections::BTreeMap;

/// Normalized key to string value mapping carried by every [`Record`](crate::Record).
pub type Fields = BTreeMap<String, String>;

/// A type alias for Result with the error type defaulting to [`TelemetryError`]
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Key holding the human-readable description
pub const ERROR: &str = "error";
/// Key holding the classifier type tag
pub const ERROR_TYPE: &str = "error_type";
/// Key holding the operation that failed, when known
pub const ERROR_OP: &str = "error_op";

/// Type tag of a Record built from a bare description
pub const RECORD_TYPE_TAG: &str = "telemetry.Record";

/// Errors raised while setting up error telemetry.
///
/// Classification and enrichment themselves never fail; only the
/// process-wide initialization paths can.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// `initialize` was called more than once
    #[error("error telemetry is already initialized")]
    AlreadyInitialized,

    /// The classifier registry was already installed or already in use
    #[error("failure classifier is already installed")]
    ClassifierInstalled,

    /// The tracing subscriber could not be installed
    #[error("failed to initialize logging: {0}")]
    Logging(String),

    /// Configuration could not be loaded
    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            TelemetryError::AlreadyInitialized.to_string(),
            "error telemetry is already initialized"
        );
        assert_eq!(
            TelemetryError::Logging("no subscriber".into()).to_string(),
            "failed to initialize logging: no subscriber"
        );
    }
}
