//! Core domain types for the MetaTrader 5 bridge.
//!
//! This crate provides the vocabulary shared by every other crate:
//! - [`Terminal`]: the binding interface the bridge wraps
//! - Native result structs (`AccountInfo`, `SymbolInfo`, `TradePosition`, ...)
//! - Terminal enumerations and trade retcodes
//! - [`Mt5Error`]: the error taxonomy (not initialized / binding / validation / trading)
//! - [`ConnectionConfig`]: terminal connection parameters

pub mod config;
pub mod constants;
pub mod error;
pub mod terminal;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::ConnectionConfig;
pub use constants::{
    retcode, CopyTicks, DealEntry, DealType, OrderFilling, OrderSide, OrderTime, OrderType,
    PositionType, Timeframe, TradeAction,
};
pub use error::{ErrorKind, ErrorRecord, Mt5Error, Mt5Result, ValidationError};
pub use terminal::{HistoryFilter, OpenFilter, Terminal};
pub use types::{
    AccountInfo, BookEntry, OrderCheckResult, OrderSendResult, Rate, SymbolInfo, TerminalInfo,
    RequestOverrides, TerminalVersion, Tick, TradeDeal, TradeOrder, TradePosition, TradeRequest,
};
