//! # Structured Logging
//!
//! Optional subscriber bootstrap plus the emission of reported records.
//! Records are logged at error level inside a span that names the module
//! they were created in.

use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

use crate::record::Record;
use crate::types::{Result, TelemetryError};

// Flag to track if logging has been initialized
static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Configuration for the logging system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// The log level to use (trace, debug, info, warn, error)
    pub level: String,
    /// The service name for identification
    pub service_name: String,
    /// Whether to output logs to a file
    pub file_output: bool,
    /// The directory to store log files in
    pub log_dir: Option<String>,
    /// Whether to use JSON formatting
    pub json_format: bool,
    /// Whether to include source file and line
    pub include_source_code: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            service_name: "unknown-service".to_string(),
            file_output: false,
            log_dir: None,
            json_format: true,
            include_source_code: true,
        }
    }
}

impl TryFrom<config::Config> for LoggingConfig {
    type Error = config::ConfigError;

    fn try_from(cfg: config::Config) -> std::result::Result<Self, Self::Error> {
        let mut base = LoggingConfig::default();

        if let Ok(level) = cfg.get::<String>("logging.level") {
            base.level = level;
        }
        if let Ok(service_name) = cfg.get::<String>("logging.service_name") {
            base.service_name = service_name;
        }
        if let Ok(file_output) = cfg.get::<bool>("logging.file_output") {
            base.file_output = file_output;
        }
        if let Ok(log_dir) = cfg.get::<String>("logging.log_dir") {
            base.log_dir = Some(log_dir);
        }
        if let Ok(json_format) = cfg.get::<bool>("logging.json_format") {
            base.json_format = json_format;
        }
        if let Ok(include_source_code) = cfg.get::<bool>("logging.include_source_code") {
            base.include_source_code = include_source_code;
        }

        Ok(base)
    }
}

/// Installs a global `tracing` subscriber.
///
/// Calling it again after a successful initialization is a no-op.
pub fn init_logging(config: Option<LoggingConfig>) -> Result<()> {
    if LOGGING_INITIALIZED.load(Ordering::SeqCst) {
        return Ok(());
    }

    let config = config.unwrap_or_default();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},warn", config.level)));

    let json_layer = config.json_format.then(|| {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_file(config.include_source_code)
            .with_line_number(config.include_source_code)
    });
    let text_layer = (!config.json_format).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(config.include_source_code)
            .with_line_number(config.include_source_code)
    });

    let file_layer = match (config.file_output, &config.log_dir) {
        (true, Some(log_dir)) => {
            let file_appender = RollingFileAppender::new(
                Rotation::DAILY,
                log_dir,
                format!("{}.log", config.service_name),
            );
            let (non_blocking, guard) = NonBlocking::new(file_appender);
            // The guard flushes on drop; keep it for the life of the process
            std::mem::forget(guard);
            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        _ => None,
    };

    let subscriber = Registry::default()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber).map_err(|e| {
        TelemetryError::Logging(format!("failed to set global subscriber: {}", e))
    })?;

    LOGGING_INITIALIZED.store(true, Ordering::SeqCst);

    tracing::info!(
        service = %config.service_name,
        level = %config.level,
        json = %config.json_format,
        "Structured logging initialized"
    );

    Ok(())
}

/// Derives a module-style namespace from a source location.
///
/// `src/db/pool.rs` becomes `db::pool`; crate roots (`lib.rs`, `main.rs`)
/// take the name of the directory holding `src`. Hyphens become underscores.
pub fn namespace_of(location: &Location<'_>) -> String {
    namespace_of_path(location.file())
}

fn namespace_of_path(file: &str) -> String {
    let path = file.replace('\\', "/");
    let path = path.strip_suffix(".rs").unwrap_or(&path);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let (krate, mut module) = match segments.iter().rposition(|s| *s == "src") {
        Some(i) => (i.checked_sub(1).map(|j| segments[j]), segments[i + 1..].to_vec()),
        None => (None, segments.clone()),
    };
    if matches!(module.last(), Some(&"mod") | Some(&"lib") | Some(&"main")) {
        module.pop();
    }
    if module.is_empty() {
        return krate.map_or_else(|| "crate".to_string(), |k| k.replace('-', "_"));
    }
    module
        .iter()
        .map(|segment| segment.replace('-', "_"))
        .collect::<Vec<_>>()
        .join("::")
}

/// Emits a record's description at error level
pub fn log_record(record: &Record) {
    let namespace = namespace_of(record.location());
    let span = tracing::error_span!("error", namespace = %namespace);
    let _entered = span.enter();

    tracing::error!(
        error_type = %record.error_type(),
        error_op = ?record.operation(),
        location = %record.location(),
        fields = ?record.fields(),
        "{}",
        record.describe()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_namespace_of_this_file() {
        assert_eq!(namespace_of(Location::caller()), "logging");
    }

    #[test]
    fn test_namespace_of_paths() {
        assert_eq!(namespace_of_path("src/db/pool.rs"), "db::pool");
        assert_eq!(namespace_of_path("src/net/mod.rs"), "net");
        assert_eq!(namespace_of_path("error-telemetry-rs/src/lib.rs"), "error_telemetry_rs");
        assert_eq!(namespace_of_path("src/wire-codec/frame-io.rs"), "wire_codec::frame_io");
        assert_eq!(
            namespace_of_path("error-telemetry-rs/tests/config-init.rs"),
            "error_telemetry_rs::tests::config_init"
        );
        assert_eq!(namespace_of_path("build.rs"), "build");
    }

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.json_format);
        assert!(!config.file_output);
    }

    #[test]
    fn test_config_overrides() {
        let cfg = config::Config::builder()
            .set_override("logging.level", "debug")
            .unwrap()
            .set_override("logging.json_format", false)
            .unwrap()
            .build()
            .unwrap();
        let config = LoggingConfig::try_from(cfg).unwrap();
        assert_eq!(config.level, "debug");
        assert!(!config.json_format);
        assert_eq!(config.service_name, "unknown-service");
    }

    #[traced_test]
    #[test]
    fn test_log_record_emits_description() {
        let mut record = Record::new("upstream refused connection");
        record.with("upstream", "billing");
        log_record(&record);

        assert!(logs_contain("upstream refused connection"));
        assert!(logs_contain("telemetry.Record"));
        assert!(logs_contain("namespace"));
    }
}
