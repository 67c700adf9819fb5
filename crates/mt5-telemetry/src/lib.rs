//! Prometheus metrics and structured logging for the MetaTrader 5 bridge.
//!
//! - Counters for binding failures, connection attempts and order outcomes
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
