//! A wrapper around the `prometheus` crate that provides a global metrics registry and functions
//! to add and use the following components (more info at
//! [Prometheus docs](https://prometheus.io/docs/concepts/metric_types/)):
//!
//! - `Histogram`: used with `start_timer(..)` and `stop_timer(..)` to record durations.
//! - `IntCounter`: used to represent an ideally ever-growing, never-shrinking integer.
//! - `IntGauge`: used to represent an varying integer (e.g., number of attestations per block).
//!
//! ## Important
//!
//! Metrics will fail if two items have the same `name`. All metrics must have a unique `name`.
//! Because we use a global registry there is no namespace per crate, it's one big global space.
//!
//! Metrics are stored as `LazyLock<Result<_>>` statics, so a metric that failed to register is
//! silently skipped by every helper instead of panicking.
//!
//! ## Example
//!
//! ```rust
//! use metrics::*;
//! use std::sync::LazyLock;
//!
//! pub static RUN_COUNT: LazyLock<Result<IntCounter>> = LazyLock::new(|| {
//!     try_create_int_counter("runs_total", "Total number of runs")
//! });
//! pub static CURRENT_VALUE: LazyLock<Result<IntGauge>> = LazyLock::new(|| {
//!     try_create_int_gauge("current_value", "The current value")
//! });
//! pub static RUN_TIME: LazyLock<Result<Histogram>> = LazyLock::new(|| {
//!     try_create_histogram("run_seconds", "Time taken (measured to high precision)")
//! });
//!
//! fn main() {
//!     for i in 0..100 {
//!         inc_counter(&RUN_COUNT);
//!         let timer = start_timer(&RUN_TIME);
//!
//!         for j in 0..10 {
//!             set_gauge(&CURRENT_VALUE, j);
//!             println!("Howdy partner");
//!         }
//!
//!         stop_timer(timer);
//!     }
//! }
//! ```

use prometheus::{Error, HistogramOpts, Opts};
use std::time::Duration;

pub use prometheus::{
    DEFAULT_BUCKETS, Encoder, Gauge, GaugeVec, Histogram, HistogramTimer, HistogramVec, IntCounter,
    IntCounterVec, IntGauge, IntGaugeVec, Result, TextEncoder, proto::MetricFamily,
};

/// Collect all the metrics for reporting.
pub fn gather() -> Vec<MetricFamily> {
    prometheus::gather()
}

/// Attempts to create an `IntCounter`, returning `Err` if the registry does not accept the counter
/// (potentially due to naming conflict).
pub fn try_create_int_counter(name: &str, help: &str) -> Result<IntCounter> {
    let opts = Opts::new(name, help);
    let counter = IntCounter::with_opts(opts)?;
    prometheus::register(Box::new(counter.clone()))?;
    Ok(counter)
}

/// Attempts to create an `IntGauge`, returning `Err` if the registry does not accept the gauge
/// (potentially due to naming conflict).
pub fn try_create_int_gauge(name: &str, help: &str) -> Result<IntGauge> {
    let opts = Opts::new(name, help);
    let gauge = IntGauge::with_opts(opts)?;
    prometheus::register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Attempts to create a `Histogram`, returning `Err` if the registry does not accept the counter
/// (potentially due to naming conflict).
pub fn try_create_histogram(name: &str, help: &str) -> Result<Histogram> {
    try_create_histogram_with_buckets(name, help, Ok(DEFAULT_BUCKETS.to_vec()))
}

/// Attempts to create a `Histogram` with specified buckets, returning `Err` if the registry does
/// not accept the histogram (potentially due to naming conflict) or no valid buckets are provided.
pub fn try_create_histogram_with_buckets(
    name: &str,
    help: &str,
    buckets: Result<Vec<f64>>,
) -> Result<Histogram> {
    let opts = HistogramOpts::new(name, help).buckets(buckets?);
    let histogram = Histogram::with_opts(opts)?;
    prometheus::register(Box::new(histogram.clone()))?;
    Ok(histogram)
}

/// Attempts to create a `IntCounterVec`, returning `Err` if the registry does not accept the
/// counter (potentially due to naming conflict).
pub fn try_create_int_counter_vec(
    name: &str,
    help: &str,
    label_names: &[&str],
) -> Result<IntCounterVec> {
    let opts = Opts::new(name, help);
    let counter_vec = IntCounterVec::new(opts, label_names)?;
    prometheus::register(Box::new(counter_vec.clone()))?;
    Ok(counter_vec)
}

/// Attempts to create a `HistogramVec`, returning `Err` if the registry does not accept the
/// histogram (potentially due to naming conflict).
pub fn try_create_histogram_vec(
    name: &str,
    help: &str,
    label_names: &[&str],
) -> Result<HistogramVec> {
    let opts = HistogramOpts::new(name, help);
    let histogram_vec = HistogramVec::new(opts, label_names)?;
    prometheus::register(Box::new(histogram_vec.clone()))?;
    Ok(histogram_vec)
}

/// Create a buckets vector with exponentially spaced values, `start * factor^i` for `count`
/// buckets.
pub fn exponential_buckets(start: f64, factor: f64, count: usize) -> Result<Vec<f64>> {
    prometheus::exponential_buckets(start, factor, count)
}

/// If `int_counter_vec.is_ok()`, returns a counter with the given `name`.
pub fn get_int_counter(
    int_counter_vec: &Result<IntCounterVec>,
    name: &[&str],
) -> Option<IntCounter> {
    if let Ok(int_counter_vec) = int_counter_vec {
        Some(int_counter_vec.get_metric_with_label_values(name).ok()?)
    } else {
        None
    }
}

/// If `histogram_vec.is_ok()`, returns a histogram with the given `name`.
pub fn get_histogram(histogram_vec: &Result<HistogramVec>, name: &[&str]) -> Option<Histogram> {
    if let Ok(histogram_vec) = histogram_vec {
        Some(histogram_vec.get_metric_with_label_values(name).ok()?)
    } else {
        None
    }
}

/// Starts a timer on `vec` with the given `name`.
pub fn start_timer_vec(vec: &Result<HistogramVec>, name: &[&str]) -> Option<HistogramTimer> {
    get_histogram(vec, name).map(|h| h.start_timer())
}

/// Starts a timer for the given `Histogram`, stopping when it gets dropped or given to `stop_timer(..)`.
pub fn start_timer(histogram: &Result<Histogram>) -> Option<HistogramTimer> {
    if let Ok(histogram) = histogram {
        Some(histogram.start_timer())
    } else {
        None
    }
}

/// Stops a timer created with `start_timer(..)`.
pub fn stop_timer(timer: Option<HistogramTimer>) {
    if let Some(t) = timer {
        t.observe_duration()
    }
}

pub fn inc_counter(counter: &Result<IntCounter>) {
    if let Ok(counter) = counter {
        counter.inc();
    }
}

pub fn inc_counter_by(counter: &Result<IntCounter>, value: u64) {
    if let Ok(counter) = counter {
        counter.inc_by(value);
    }
}

/// Increments the `int_counter_vec` with the given `name`.
pub fn inc_counter_vec(int_counter_vec: &Result<IntCounterVec>, name: &[&str]) {
    if let Some(counter) = get_int_counter(int_counter_vec, name) {
        counter.inc()
    }
}

pub fn inc_counter_vec_by(int_counter_vec: &Result<IntCounterVec>, name: &[&str], amount: u64) {
    if let Some(counter) = get_int_counter(int_counter_vec, name) {
        counter.inc_by(amount);
    }
}

pub fn set_gauge(gauge: &Result<IntGauge>, value: i64) {
    if let Ok(gauge) = gauge {
        gauge.set(value);
    }
}

pub fn inc_gauge(gauge: &Result<IntGauge>) {
    if let Ok(gauge) = gauge {
        gauge.inc();
    }
}

pub fn dec_gauge(gauge: &Result<IntGauge>) {
    if let Ok(gauge) = gauge {
        gauge.dec();
    }
}

pub fn observe(histogram: &Result<Histogram>, value: f64) {
    if let Ok(histogram) = histogram {
        histogram.observe(value);
    }
}

pub fn observe_duration(histogram: &Result<Histogram>, duration: Duration) {
    if let Ok(histogram) = histogram {
        histogram.observe(duration.as_secs_f64())
    }
}

/// Returns the current value of `counter`, or `None` if it failed to register.
pub fn get_int_counter_value(counter: &Result<IntCounter>) -> Option<u64> {
    counter.as_ref().ok().map(|counter| counter.get())
}

/// Returns the current value of `gauge`, or `None` if it failed to register.
pub fn get_int_gauge_value(gauge: &Result<IntGauge>) -> Option<i64> {
    gauge.as_ref().ok().map(|gauge| gauge.get())
}

/// Encodes every registered metric in the Prometheus text format.
pub fn encode_text() -> std::result::Result<String, Error> {
    let mut buffer = vec![];
    TextEncoder::new().encode(&gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::LazyLock;

    static TEST_COUNTER: LazyLock<Result<IntCounter>> =
        LazyLock::new(|| try_create_int_counter("metrics_test_counter_total", "A test counter"));
    static TEST_GAUGE: LazyLock<Result<IntGauge>> =
        LazyLock::new(|| try_create_int_gauge("metrics_test_gauge", "A test gauge"));
    static TEST_HISTOGRAM: LazyLock<Result<Histogram>> =
        LazyLock::new(|| try_create_histogram("metrics_test_seconds", "A test histogram"));

    #[test]
    fn duplicate_names_are_rejected() {
        assert!(try_create_int_gauge("metrics_test_duplicate", "first").is_ok());
        assert!(try_create_int_gauge("metrics_test_duplicate", "second").is_err());
    }

    #[test]
    fn helpers_update_registered_metrics() {
        inc_counter(&TEST_COUNTER);
        inc_counter_by(&TEST_COUNTER, 2);
        assert_eq!(get_int_counter_value(&TEST_COUNTER), Some(3));

        set_gauge(&TEST_GAUGE, 7);
        dec_gauge(&TEST_GAUGE);
        assert_eq!(get_int_gauge_value(&TEST_GAUGE), Some(6));

        let timer = start_timer(&TEST_HISTOGRAM);
        assert!(timer.is_some());
        stop_timer(timer);

        let text = encode_text().unwrap();
        assert!(text.contains("metrics_test_gauge 6"));
    }

    #[test]
    fn unregistered_metrics_are_ignored() {
        let failed: Result<IntGauge> = Err(Error::Msg("unregistered".into()));
        set_gauge(&failed, 1);
        assert_eq!(get_int_gauge_value(&failed), None);
    }
}
