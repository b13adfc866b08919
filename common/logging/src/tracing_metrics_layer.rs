//! Exposes [`MetricsLayer`]: A tracing layer that registers metrics of logging events.

use crate::{CRIT_TAG, CRITS_TOTAL, ERRORS_TOTAL, INFOS_TOTAL, WARNS_TOTAL};
use std::fmt;
use std::sync::LazyLock;
use tracing_core::field::{Field, Visit};

pub static DEP_INFOS_TOTAL: LazyLock<metrics::Result<metrics::IntCounterVec>> =
    LazyLock::new(|| {
        metrics::try_create_int_counter_vec(
            "dep_info_total",
            "Count of infos logged per enabled dependency",
            &["target"],
        )
    });
pub static DEP_WARNS_TOTAL: LazyLock<metrics::Result<metrics::IntCounterVec>> =
    LazyLock::new(|| {
        metrics::try_create_int_counter_vec(
            "dep_warn_total",
            "Count of warns logged per enabled dependency",
            &["target"],
        )
    });
pub static DEP_ERRORS_TOTAL: LazyLock<metrics::Result<metrics::IntCounterVec>> =
    LazyLock::new(|| {
        metrics::try_create_int_counter_vec(
            "dep_error_total",
            "Count of errors logged per enabled dependency",
            &["target"],
        )
    });

/// Counts log events by level, both globally and per crate.
#[derive(Default)]
pub struct MetricsLayer {}

impl<S: tracing_core::Subscriber> tracing_subscriber::layer::Layer<S> for MetricsLayer {
    fn on_event(
        &self,
        event: &tracing_core::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let meta = event.metadata();
        if !meta.is_event() {
            return;
        }
        let target = match meta.target().split_once("::") {
            Some((crate_name, _)) => crate_name,
            None => meta.target(),
        };
        let target = &[target];
        match *meta.level() {
            tracing_core::Level::INFO => {
                metrics::inc_counter(&INFOS_TOTAL);
                metrics::inc_counter_vec(&DEP_INFOS_TOTAL, target);
            }
            tracing_core::Level::WARN => {
                metrics::inc_counter(&WARNS_TOTAL);
                metrics::inc_counter_vec(&DEP_WARNS_TOTAL, target);
            }
            tracing_core::Level::ERROR => {
                let mut visitor = CritVisitor::default();
                event.record(&mut visitor);
                if visitor.is_crit {
                    metrics::inc_counter(&CRITS_TOTAL);
                } else {
                    metrics::inc_counter(&ERRORS_TOTAL);
                }
                metrics::inc_counter_vec(&DEP_ERRORS_TOTAL, target);
            }
            _ => {}
        }
    }
}

#[derive(Default)]
struct CritVisitor {
    is_crit: bool,
}

impl Visit for CritVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "error_type" && value == CRIT_TAG {
            self.is_crit = true;
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
}
