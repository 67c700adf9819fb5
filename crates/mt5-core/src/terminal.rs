//! The terminal binding interface.
//!
//! Every call mirrors one function of the terminal's client API. Calls report
//! failure by returning `None` (or `false`); the reason is then available from
//! [`Terminal::last_error`]. Implementations are black boxes to the bridge.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::config::ConnectionConfig;
use crate::constants::{CopyTicks, OrderType, Timeframe};
use crate::types::{
    AccountInfo, BookEntry, OrderCheckResult, OrderSendResult, Rate, SymbolInfo, TerminalInfo,
    TerminalVersion, Tick, TradeDeal, TradeOrder, TradePosition, TradeRequest,
};

/// Filter for `orders_get` / `positions_get`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenFilter {
    pub symbol: Option<String>,
    pub group: Option<String>,
    pub ticket: Option<i64>,
}

impl OpenFilter {
    pub fn symbol(symbol: impl Into<String>) -> Self {
        Self {
            symbol: Some(symbol.into()),
            ..Self::default()
        }
    }

    pub fn ticket(ticket: i64) -> Self {
        Self {
            ticket: Some(ticket),
            ..Self::default()
        }
    }
}

impl fmt::Display for OpenFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "symbol={:?}, group={:?}, ticket={:?}",
            self.symbol, self.group, self.ticket
        )
    }
}

/// Filter for `history_orders_get` / `history_deals_get`.
///
/// Exactly one selection mode applies per query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryFilter {
    Ticket(i64),
    Position(i64),
    Range {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        group: Option<String>,
    },
}

impl fmt::Display for HistoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ticket(ticket) => write!(f, "ticket={ticket}"),
            Self::Position(position) => write!(f, "position={position}"),
            Self::Range { from, to, group } => {
                write!(f, "date_from={from}, date_to={to}")?;
                if let Some(group) = group {
                    write!(f, ", group={group}")?;
                }
                Ok(())
            }
        }
    }
}

/// MetaTrader 5 terminal binding.
///
/// Methods take `&self`; the binding keeps its own connection state.
pub trait Terminal {
    /// Attach to (or launch) the terminal. Unset config fields are omitted.
    fn initialize(&self, config: &ConnectionConfig) -> bool;

    fn login(&self, login: i64, password: &str, server: &str, timeout: Option<u64>) -> bool;

    fn shutdown(&self);

    /// `(code, description)` of the most recent failure.
    fn last_error(&self) -> (i32, String);

    fn version(&self) -> Option<TerminalVersion>;

    fn account_info(&self) -> Option<AccountInfo>;

    fn terminal_info(&self) -> Option<TerminalInfo>;

    fn symbols_total(&self) -> Option<i64>;

    fn symbols_get(&self, group: Option<&str>) -> Option<Vec<SymbolInfo>>;

    fn symbol_info(&self, symbol: &str) -> Option<SymbolInfo>;

    fn symbol_info_tick(&self, symbol: &str) -> Option<Tick>;

    fn symbol_select(&self, symbol: &str, enable: bool) -> bool;

    fn market_book_add(&self, symbol: &str) -> bool;

    fn market_book_release(&self, symbol: &str) -> bool;

    fn market_book_get(&self, symbol: &str) -> Option<Vec<BookEntry>>;

    fn copy_rates_from(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        date_from: DateTime<Utc>,
        count: usize,
    ) -> Option<Vec<Rate>>;

    fn copy_rates_from_pos(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_pos: usize,
        count: usize,
    ) -> Option<Vec<Rate>>;

    fn copy_rates_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
    ) -> Option<Vec<Rate>>;

    fn copy_ticks_from(
        &self,
        symbol: &str,
        date_from: DateTime<Utc>,
        count: usize,
        flags: CopyTicks,
    ) -> Option<Vec<Tick>>;

    fn copy_ticks_range(
        &self,
        symbol: &str,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
        flags: CopyTicks,
    ) -> Option<Vec<Tick>>;

    fn orders_total(&self) -> Option<i64>;

    fn orders_get(&self, filter: &OpenFilter) -> Option<Vec<TradeOrder>>;

    fn order_calc_margin(
        &self,
        order_type: OrderType,
        symbol: &str,
        volume: f64,
        price: f64,
    ) -> Option<f64>;

    fn order_calc_profit(
        &self,
        order_type: OrderType,
        symbol: &str,
        volume: f64,
        price_open: f64,
        price_close: f64,
    ) -> Option<f64>;

    fn order_check(&self, request: &TradeRequest) -> Option<OrderCheckResult>;

    fn order_send(&self, request: &TradeRequest) -> Option<OrderSendResult>;

    fn positions_total(&self) -> Option<i64>;

    fn positions_get(&self, filter: &OpenFilter) -> Option<Vec<TradePosition>>;

    fn history_orders_total(&self, date_from: DateTime<Utc>, date_to: DateTime<Utc>)
        -> Option<i64>;

    fn history_orders_get(&self, filter: &HistoryFilter) -> Option<Vec<TradeOrder>>;

    fn history_deals_total(&self, date_from: DateTime<Utc>, date_to: DateTime<Utc>)
        -> Option<i64>;

    fn history_deals_get(&self, filter: &HistoryFilter) -> Option<Vec<TradeDeal>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_history_filter_display() {
        assert_eq!(HistoryFilter::Ticket(7).to_string(), "ticket=7");
        assert_eq!(HistoryFilter::Position(9).to_string(), "position=9");

        let range = HistoryFilter::Range {
            from: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            group: Some("*EURUSD*".to_string()),
        };
        let text = range.to_string();
        assert!(text.starts_with("date_from=2024-01-01"));
        assert!(text.ends_with("group=*EURUSD*"));
    }

    #[test]
    fn test_open_filter_constructors() {
        assert_eq!(OpenFilter::symbol("EURUSD").symbol.as_deref(), Some("EURUSD"));
        assert_eq!(OpenFilter::ticket(5).ticket, Some(5));
        assert_eq!(OpenFilter::default().symbol, None);
    }
}
