//! Error types for the MetaTrader 5 bridge.
//!
//! One error enum is shared by every layer so that the terminal's failures are
//! reported with identical text regardless of which operation hit them.

use std::fmt;
use thiserror::Error;

/// Failure reported by the terminal binding.
///
/// Built immediately before the error is raised from the binding's
/// `last_error()` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Name of the binding call that failed (e.g. `symbol_info`).
    pub operation: String,
    /// Terminal error code.
    pub code: i32,
    /// Terminal error description.
    pub description: String,
    /// Summary of the call's arguments. Never contains passwords.
    pub context: Option<String>,
}

impl ErrorRecord {
    pub fn new(
        operation: impl Into<String>,
        (code, description): (i32, String),
        context: Option<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            code,
            description,
            context,
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed: {} - {}",
            self.operation, self.code, self.description
        )?;
        if let Some(context) = &self.context {
            write!(f, " (context: {context})")?;
        }
        Ok(())
    }
}

/// Input rejected before any binding call was made.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid count: {0}. Count must be positive.")]
    NonPositiveCount(i64),

    #[error("Invalid date range: from={from} must be before to={to}")]
    InvalidDateRange { from: String, to: String },

    #[error("Both date_from and date_to must be provided if not using ticket or position.")]
    MissingDateRange,

    #[error("Invalid start_pos: {0}. Position must be non-negative.")]
    NegativePosition(i64),

    #[error("Invalid {name}: {value}. {} must be positive.", display_name(.name))]
    NonPositiveValue { name: String, value: f64 },

    #[error("Key column `{column}` is missing from row {row}")]
    MissingKeyColumn { column: String, row: usize },

    #[error("Column `{0}` is required but missing")]
    MissingColumn(String),

    #[error("MetaTrader5 does not support the given granularity: {0}")]
    UnsupportedGranularity(String),

    #[error("Invalid timestamp: {0}. Epoch seconds are out of range.")]
    InvalidTimestamp(i64),

    #[error("Row {row} has {found} values but the table has {expected} columns")]
    RowLength {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// `price_*` fields read as "Price"; other names are humanized.
fn display_name(name: &str) -> String {
    if name.starts_with("price_") {
        return "Price".to_string();
    }
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Coarse classification used by callers to pick a user-visible status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller supplied bad input.
    ClientInput,
    /// The terminal is not connected or reported a failure.
    UpstreamUnavailable,
    /// The trade server rejected an order.
    TradeRejected,
    /// Anything else (configuration, programming errors).
    Internal,
}

/// Bridge error taxonomy.
#[derive(Debug, Error)]
pub enum Mt5Error {
    #[error("MetaTrader5 not initialized. Call initialize() first.")]
    NotInitialized,

    #[error("{0}")]
    Binding(ErrorRecord),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{operation}() failed and aborted. <= `{comment}`")]
    TradingAborted {
        operation: String,
        retcode: u32,
        comment: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Mt5Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ClientInput,
            Self::NotInitialized | Self::Binding(_) => ErrorKind::UpstreamUnavailable,
            Self::TradingAborted { .. } => ErrorKind::TradeRejected,
            Self::Config(_) => ErrorKind::Internal,
        }
    }

    /// The binding error record, if this is a binding failure.
    pub fn record(&self) -> Option<&ErrorRecord> {
        match self {
            Self::Binding(record) => Some(record),
            _ => None,
        }
    }
}

/// Result type alias for bridge operations.
pub type Mt5Result<T> = Result<T, Mt5Error>;
