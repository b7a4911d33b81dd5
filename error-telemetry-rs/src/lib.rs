//! # Error Telemetry
//!
//! Structured error telemetry for Phoenix ORCH services. Failures of any type
//! are turned into [`Record`]s: flat maps of normalized keys to string values
//! carrying the operation that failed, a stable type tag, a description and
//! whatever context the caller and the ambient scope add. Records are then
//! logged and handed to a pluggable [`Reporter`].
//!
//! ## Features
//!
//! - Rule-based failure classification with built-in network, filesystem,
//!   process, TLS, protocol and parsing rules
//! - Thread-scoped ambient context merged into every new record
//! - Fluent, in-place enrichment
//! - Once-configured reporting facade with structured logging and metrics
//!
//! ```
//! use error_telemetry::{Record, ResultExt};
//!
//! let err = "eighty".parse::<u16>().wrap_err_with_op("parse_port").unwrap_err();
//! assert_eq!(err.error_type(), "num.ParseIntError");
//! assert_eq!(err.operation(), Some("parse_port"));
//!
//! let mut record = Record::new("upstream unavailable");
//! record.with("Retry-Count", 3);
//! assert_eq!(record.get("retry_count"), Some("3"));
//! ```

pub mod classify;
pub mod context;
pub mod kinds;
pub mod logging;
pub mod normalize;
pub mod record;
pub mod reporting;
pub mod types;

// Re-export commonly used types
pub use classify::{classify, Classification, Classifier, Stage};
pub use context::Contextual;
pub use logging::init_logging;
pub use normalize::normalize_key;
pub use record::{wrap, Record, ResultExt};
pub use reporting::{
    initialize, report, report_error, MemoryReporter, NoopReporter, Reporter, TelemetryConfig,
};
pub use types::{Fields, Result, TelemetryError};

/// Initializes logging, the classifier and the reporting facade from
/// configuration.
///
/// Reads `error_telemetry.*` for the facade and `logging.*` for the
/// subscriber; the subscriber is only installed when logging is enabled.
pub fn init_with_config<R>(config: config::Config, reporter: R) -> Result<()>
where
    R: Reporter + 'static,
{
    let telemetry = TelemetryConfig::try_from(config.clone())?;

    if telemetry.enable_logging {
        let log_config = logging::LoggingConfig::try_from(config)?;
        init_logging(Some(log_config))?;
    }

    let classifier = Classifier::builtin().with_stderr_limit(telemetry.stderr_limit);
    match classify::install(classifier) {
        Err(TelemetryError::ClassifierInstalled)
            if classify::registry().stderr_limit() == telemetry.stderr_limit => {}
        other => other?,
    }

    reporting::initialize_with(&telemetry, reporter)
}
