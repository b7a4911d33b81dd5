//! # Error Reporting
//!
//! The process-wide reporting facade. It is configured exactly once with an
//! application version, a [`Reporter`] sink and a logging switch; afterwards
//! every reported [`Record`] is optionally logged, counted and handed to the
//! sink together with the application version.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use metrics::counter;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::classify::DEFAULT_STDERR_LIMIT;
use crate::logging;
use crate::record::Record;
use crate::types::{Fields, Result, TelemetryError};

/// Destination of reported records
pub trait Reporter: Send + Sync {
    /// Receives the fields of one record. Failures are the sink's business.
    fn send(&self, fields: &Fields, application_version: &str);
}

impl<F> Reporter for F
where
    F: Fn(&Fields, &str) + Send + Sync,
{
    fn send(&self, fields: &Fields, application_version: &str) {
        self(fields, application_version)
    }
}

/// Discards every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn send(&self, _fields: &Fields, _application_version: &str) {}
}

/// One report as kept by [`MemoryReporter`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub fields: Fields,
    pub application_version: String,
    pub reported_at: DateTime<Utc>,
}

/// Keeps the most recent reports in memory, oldest first.
///
/// Clones share the same buffer.
#[derive(Debug, Clone)]
pub struct MemoryReporter {
    recent: Arc<Mutex<VecDeque<Report>>>,
    limit: usize,
}

impl MemoryReporter {
    /// Default number of reports kept
    pub const DEFAULT_LIMIT: usize = 100;

    pub fn new(limit: usize) -> Self {
        Self {
            recent: Arc::new(Mutex::new(VecDeque::with_capacity(limit))),
            limit,
        }
    }

    /// Snapshot of the buffered reports
    pub fn reports(&self) -> Vec<Report> {
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// The newest report
    pub fn last(&self) -> Option<Report> {
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .back()
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for MemoryReporter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT)
    }
}

impl Reporter for MemoryReporter {
    fn send(&self, fields: &Fields, application_version: &str) {
        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        recent.push_back(Report {
            fields: fields.clone(),
            application_version: application_version.to_string(),
            reported_at: Utc::now(),
        });
        while recent.len() > self.limit {
            recent.pop_front();
        }
    }
}

/// Configuration for error telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Version string attached to every report
    pub application_version: String,
    /// Whether reported records are also logged
    pub enable_logging: bool,
    /// Whether to count reports through the `metrics` facade
    pub record_metrics: bool,
    /// Cap on captured process stderr, in bytes
    pub stderr_limit: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            application_version: "unknown".to_string(),
            enable_logging: true,
            record_metrics: true,
            stderr_limit: DEFAULT_STDERR_LIMIT,
        }
    }
}

impl TelemetryConfig {
    /// Loads the configuration from `ERROR_TELEMETRY_*` environment
    /// variables, reading a `.env` file first if there is one.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(config::Environment::with_prefix("ERROR_TELEMETRY"))
            .build()?;

        Ok(Self::from_source(&cfg, ""))
    }

    fn from_source(cfg: &config::Config, prefix: &str) -> Self {
        let key = |name: &str| format!("{}{}", prefix, name);
        let mut base = TelemetryConfig::default();

        if let Ok(version) = cfg.get::<String>(&key("application_version")) {
            base.application_version = version;
        }
        if let Ok(enable_logging) = cfg.get::<bool>(&key("enable_logging")) {
            base.enable_logging = enable_logging;
        }
        if let Ok(record_metrics) = cfg.get::<bool>(&key("record_metrics")) {
            base.record_metrics = record_metrics;
        }
        if let Ok(stderr_limit) = cfg.get::<usize>(&key("stderr_limit")) {
            base.stderr_limit = stderr_limit;
        }

        base
    }
}

impl TryFrom<config::Config> for TelemetryConfig {
    type Error = config::ConfigError;

    fn try_from(cfg: config::Config) -> std::result::Result<Self, Self::Error> {
        Ok(Self::from_source(&cfg, "error_telemetry."))
    }
}

struct Facade {
    application_version: String,
    reporter: Box<dyn Reporter>,
    logging_enabled: bool,
    record_metrics: bool,
}

static FACADE: OnceCell<Facade> = OnceCell::new();

/// Configures the reporting facade.
///
/// Only the first call takes effect; later calls return
/// [`TelemetryError::AlreadyInitialized`].
pub fn initialize<R>(
    application_version: impl Into<String>,
    reporter: R,
    enable_logging: bool,
) -> Result<()>
where
    R: Reporter + 'static,
{
    install(Facade {
        application_version: application_version.into(),
        reporter: Box::new(reporter),
        logging_enabled: enable_logging,
        record_metrics: true,
    })
}

/// Configures the reporting facade from a [`TelemetryConfig`]
pub fn initialize_with<R>(config: &TelemetryConfig, reporter: R) -> Result<()>
where
    R: Reporter + 'static,
{
    install(Facade {
        application_version: config.application_version.clone(),
        reporter: Box::new(reporter),
        logging_enabled: config.enable_logging,
        record_metrics: config.record_metrics,
    })
}

fn install(facade: Facade) -> Result<()> {
    let version = facade.application_version.clone();
    let logging_enabled = facade.logging_enabled;

    FACADE
        .set(facade)
        .map_err(|_| TelemetryError::AlreadyInitialized)?;

    tracing::info!(
        application_version = %version,
        logging = logging_enabled,
        "Error telemetry initialized"
    );

    Ok(())
}

/// Whether [`initialize`] has run
pub fn is_initialized() -> bool {
    FACADE.get().is_some()
}

/// The configured application version
pub fn application_version() -> Option<&'static str> {
    FACADE.get().map(|facade| facade.application_version.as_str())
}

/// Reports a record.
///
/// Before [`initialize`] this drops the record.
pub fn report(record: &Record) {
    let Some(facade) = FACADE.get() else {
        tracing::debug!(
            error = %record.describe(),
            error_type = %record.error_type(),
            "Error telemetry not initialized, dropping report"
        );
        return;
    };

    if facade.logging_enabled {
        logging::log_record(record);
    }
    if facade.record_metrics {
        counter!("errors.reported", 1, "error_type" => record.error_type().to_string());
    }

    facade
        .reporter
        .send(record.fields(), &facade.application_version);
}

/// Wraps a failure, reports it and hands the record back
#[track_caller]
pub fn report_error<E>(err: E) -> Record
where
    E: std::error::Error + Send + Sync + 'static,
{
    let record = Record::wrap(err);
    report(&record);
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_memory_reporter_is_bounded() {
        let reporter = MemoryReporter::new(2);
        for n in 0..3 {
            reporter.send(&fields(&[("n", &n.to_string())]), "1.0.0");
        }

        let reports = reporter.reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].fields["n"], "1");
        assert_eq!(reports[1].fields["n"], "2");
        assert_eq!(
            reporter.last().map(|r| r.application_version),
            Some("1.0.0".to_string())
        );
    }

    #[test]
    fn test_memory_reporter_clones_share_buffer() {
        let reporter = MemoryReporter::default();
        let handle = reporter.clone();
        reporter.send(&fields(&[("k", "v")]), "2.1");
        assert_eq!(handle.len(), 1);
        handle.clear();
        assert!(reporter.is_empty());
    }

    #[test]
    fn test_closure_reporter() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let reporter = move |fields: &Fields, version: &str| {
            assert_eq!(version, "3.0");
            assert_eq!(fields["error"], "boom");
            seen.fetch_add(1, Ordering::SeqCst);
        };

        reporter.send(&fields(&[("error", "boom")]), "3.0");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_config_defaults() {
        let config = TelemetryConfig::default();
        assert_eq!(config.application_version, "unknown");
        assert!(config.enable_logging);
        assert_eq!(config.stderr_limit, DEFAULT_STDERR_LIMIT);
    }

    #[test]
    fn test_config_from_source() {
        let cfg = config::Config::builder()
            .set_override("error_telemetry.application_version", "4.2.0")
            .unwrap()
            .set_override("error_telemetry.enable_logging", false)
            .unwrap()
            .set_override("error_telemetry.stderr_limit", 512)
            .unwrap()
            .build()
            .unwrap();

        let config = TelemetryConfig::try_from(cfg).unwrap();
        assert_eq!(config.application_version, "4.2.0");
        assert!(!config.enable_logging);
        assert!(config.record_metrics);
        assert_eq!(config.stderr_limit, 512);
    }
}
