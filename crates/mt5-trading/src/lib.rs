//! Trading on top of the MetaTrader 5 query layer.
//!
//! - [`TradingClient`]: order submission with result classification,
//!   position closing, SL/TP updates
//! - [`sizing`]: margin-based volume sizing, position exposure metrics and
//!   market-data conveniences
//! - [`analytics`]: pure performance and risk statistics over deals

pub mod analytics;
pub mod sizing;
pub mod trading;

pub use analytics::{
    daily_pnl, daily_pnl_table, deal_rows, drawdown, drawdown_series, risk_metrics,
    trading_summary, DailyPnl, DealRow, Drawdown, PerformanceReport, RiskMetrics,
    TradingSummary,
};
pub use sizing::{MinimumMargin, PositionMetrics};
pub use trading::{
    classify, MarketOrder, OrderOutcome, OrderResponse, SymbolSelector, TradingClient,
};
