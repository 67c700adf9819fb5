//! Prometheus metrics for the bridge.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a startup configuration error. These
//! panics only occur during static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_int_gauge, CounterVec, Encoder, IntGauge, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Binding calls that returned no result.
/// Labels: operation
pub static BINDING_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "mt5_binding_failures_total",
        "Terminal binding calls that reported failure",
        &["operation"]
    )
    .unwrap()
});

/// Terminal connection attempts.
/// Labels: outcome (success/failure)
pub static CONNECT_ATTEMPTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "mt5_connect_attempts_total",
        "Terminal initialize attempts",
        &["outcome"]
    )
    .unwrap()
});

/// Classified order results.
/// Labels: operation (order_send/order_check), outcome (done/skipped/aborted)
pub static ORDER_OUTCOMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "mt5_order_outcomes_total",
        "Order submissions and checks by outcome",
        &["operation", "outcome"]
    )
    .unwrap()
});

/// Session state (1 = initialized).
pub static SESSION_INITIALIZED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "mt5_session_initialized",
        "Terminal session state (1=initialized)"
    )
    .unwrap()
});

/// Metric recording facade.
pub struct Metrics;

impl Metrics {
    pub fn binding_failure(operation: &str) {
        BINDING_FAILURES_TOTAL.with_label_values(&[operation]).inc();
    }

    pub fn connect_attempt(success: bool) {
        let outcome = if success { "success" } else { "failure" };
        CONNECT_ATTEMPTS_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn order_outcome(operation: &str, outcome: &str) {
        ORDER_OUTCOMES_TOTAL
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn session_opened() {
        SESSION_INITIALIZED.set(1);
    }

    pub fn session_closed() {
        SESSION_INITIALIZED.set(0);
    }

    /// Current value of a counter, for reporting.
    pub fn counter_value(counter: &CounterVec, labels: &[&str]) -> u64 {
        counter.with_label_values(labels).get() as u64
    }

    /// Every registered metric in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_failure_counter_increments() {
        let before = Metrics::counter_value(&BINDING_FAILURES_TOTAL, &["metrics_test_op"]);
        Metrics::binding_failure("metrics_test_op");
        Metrics::binding_failure("metrics_test_op");
        let after = Metrics::counter_value(&BINDING_FAILURES_TOTAL, &["metrics_test_op"]);
        assert_eq!(after - before, 2);
    }

    #[test]
    fn test_gather_text_contains_registered_metrics() {
        Metrics::order_outcome("order_send", "done");
        Metrics::session_opened();
        let text = Metrics::gather_text().unwrap();
        assert!(text.contains("mt5_order_outcomes_total"));
        assert!(text.contains("mt5_session_initialized"));
    }
}
