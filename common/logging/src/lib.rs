use metrics::{IntCounter, Result as MetricsResult, try_create_int_counter};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry, fmt};

pub mod macros;
mod tracing_metrics_layer;

pub use tracing_metrics_layer::MetricsLayer;

/// The value of the `error_type` field attached by `crit!`.
pub const CRIT_TAG: &str = "crit";

/// The minimum interval between log messages indicating that a queue is full.
const LOG_DEBOUNCE_INTERVAL: Duration = Duration::from_secs(30);

pub static INFOS_TOTAL: LazyLock<MetricsResult<IntCounter>> =
    LazyLock::new(|| try_create_int_counter("info_total", "Count of infos logged"));
pub static WARNS_TOTAL: LazyLock<MetricsResult<IntCounter>> =
    LazyLock::new(|| try_create_int_counter("warn_total", "Count of warns logged"));
pub static ERRORS_TOTAL: LazyLock<MetricsResult<IntCounter>> =
    LazyLock::new(|| try_create_int_counter("error_total", "Count of errors logged"));
pub static CRITS_TOTAL: LazyLock<MetricsResult<IntCounter>> =
    LazyLock::new(|| try_create_int_counter("crit_total", "Count of crits logged"));

/// Provides de-bounce functionality for logging.
#[derive(Default)]
pub struct TimeLatch(Option<Instant>);

impl TimeLatch {
    /// Only returns true once every `LOG_DEBOUNCE_INTERVAL`.
    pub fn elapsed(&mut self) -> bool {
        let now = Instant::now();

        let is_elapsed = self.0.is_some_and(|elapse_time| now > elapse_time);

        if is_elapsed || self.0.is_none() {
            self.0 = Some(now + LOG_DEBOUNCE_INTERVAL);
        }

        is_elapsed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Level used when `RUST_LOG` is not set.
    pub debug_level: String,
    /// Emit stdout logs as JSON objects.
    pub log_format_json: bool,
    pub log_color: bool,
    /// Directory for an additional log file. No file is written when `None`.
    pub path: Option<PathBuf>,
    pub logfile_name: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            debug_level: "info".to_string(),
            log_format_json: false,
            log_color: true,
            path: None,
            logfile_name: "forkchoice.log".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum Error {
    UnsupportedLogLevel(String),
    InvalidFilter(String),
    AlreadyInitialized(String),
}

pub fn parse_level(level: &str) -> Result<LevelFilter, Error> {
    match level.to_lowercase().as_str() {
        "error" => Ok(LevelFilter::ERROR),
        "warn" => Ok(LevelFilter::WARN),
        "info" => Ok(LevelFilter::INFO),
        "debug" => Ok(LevelFilter::DEBUG),
        "trace" => Ok(LevelFilter::TRACE),
        other => Err(Error::UnsupportedLogLevel(other.to_string())),
    }
}

/// Builds the `EnvFilter`, preferring `RUST_LOG` over the configured level.
pub fn build_env_filter(config: &LoggerConfig) -> Result<EnvFilter, Error> {
    let level = parse_level(&config.debug_level)?;
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.to_string().to_lowercase()))
        .map_err(|e| Error::InvalidFilter(e.to_string()))
}

/// Installs the global tracing subscriber.
///
/// The returned guard flushes the log file when dropped and must be held for the lifetime of the
/// process.
pub fn init_tracing(config: &LoggerConfig) -> Result<Option<WorkerGuard>, Error> {
    let filter = build_env_filter(config)?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = vec![MetricsLayer {}.boxed()];

    if config.log_format_json {
        layers.push(fmt::layer().json().boxed());
    } else {
        layers.push(fmt::layer().with_ansi(config.log_color).boxed());
    }

    let guard = if let Some(dir) = &config.path {
        let file_appender = tracing_appender::rolling::never(dir, &config.logfile_name);
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking_writer)
                .boxed(),
        );
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| Error::AlreadyInitialized(e.to_string()))?;

    Ok(guard)
}

/// Return a tracing subscriber suitable for test usage.
///
/// By default no logs will be printed, but they can be enabled via
/// the `test_logger` feature.  This feature can be enabled for any
/// dependent crate by passing `--features logging/test_logger`, e.g.
/// ```bash
/// cargo test -p fork_choice --features logging/test_logger
/// ```
pub fn create_test_tracing_subscriber() {
    if cfg!(feature = "test_logger") {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("debug"))
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn time_latch_fires_once_per_interval() {
        let mut latch = TimeLatch::default();
        assert!(!latch.elapsed(), "first call arms the latch");
        assert!(!latch.elapsed(), "interval has not passed");

        latch.0 = Some(Instant::now() - Duration::from_secs(1));
        assert!(latch.elapsed());
        assert!(!latch.elapsed());
    }

    #[test]
    fn parses_levels_case_insensitively() {
        assert_eq!(parse_level("DEBUG").unwrap(), LevelFilter::DEBUG);
        assert_eq!(parse_level("warn").unwrap(), LevelFilter::WARN);
        assert!(matches!(
            parse_level("verbose"),
            Err(Error::UnsupportedLogLevel(_))
        ));
    }

    #[test]
    fn config_fills_missing_fields_with_defaults() {
        let config: LoggerConfig = serde_yaml::from_str("debug_level: debug").unwrap();
        assert_eq!(config.debug_level, "debug");
        assert_eq!(config.logfile_name, LoggerConfig::default().logfile_name);
        assert!(config.path.is_none());
    }

    #[test]
    fn metrics_layer_separates_crits_from_errors() {
        let subscriber = tracing_subscriber::registry().with(MetricsLayer::default());

        let errors_before = metrics::get_int_counter_value(&ERRORS_TOTAL).unwrap_or(0);
        let crits_before = metrics::get_int_counter_value(&CRITS_TOTAL).unwrap_or(0);

        tracing::subscriber::with_default(subscriber, || {
            crate::crit!(reason = "test", "Critical failure");
            tracing::error!("Plain error");
        });

        assert_eq!(
            metrics::get_int_counter_value(&CRITS_TOTAL),
            Some(crits_before + 1)
        );
        assert!(metrics::get_int_counter_value(&ERRORS_TOTAL) > Some(errors_before));
    }
}
