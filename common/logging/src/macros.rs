/// Logs at `ERROR` level, tagged so that log consumers and `MetricsLayer` treat the event as
/// critical.
///
/// Reserved for conditions that indicate a bug or corrupted state rather than bad input.
#[macro_export]
macro_rules! crit {
    ($($arg:tt)*) => {
        tracing::error!(error_type = "crit", $($arg)*);
    };
}
