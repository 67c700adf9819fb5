//! Order orchestration.
//!
//! Every generated request goes through [`TradingClient::submit_or_validate`],
//! which dispatches to `order_send` or `order_check` and classifies the
//! returned retcode:
//!
//! | retcode                           | outcome                    |
//! |-----------------------------------|----------------------------|
//! | `DONE` (send) / `0` (check)       | [`OrderOutcome::Done`]     |
//! | `TRADE_DISABLED`, `MARKET_CLOSED` | [`OrderOutcome::Skipped`]  |
//! | anything else                     | `Mt5Error::TradingAborted` |

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use mt5_client::{
    Connectable, DataClient, HistoryQuery, Mt5Client, Mt5Config, TradingConfig,
};
use mt5_core::{
    retcode, DealEntry, DealType, Mt5Error, Mt5Result, OpenFilter, OrderCheckResult,
    OrderFilling, OrderSendResult, OrderSide, OrderTime, PositionType, RequestOverrides, Terminal,
    TradeAction, TradePosition, TradeRequest,
};
use mt5_frame::{FrameOptions, Record, ToRecord};
use mt5_telemetry::Metrics;

use crate::analytics::{self, PerformanceReport};

/// Raw result of a submission or a validation.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderResponse {
    Send(OrderSendResult),
    Check(OrderCheckResult),
}

impl OrderResponse {
    pub fn retcode(&self) -> u32 {
        match self {
            Self::Send(r) => r.retcode,
            Self::Check(r) => r.retcode,
        }
    }

    pub fn comment(&self) -> &str {
        match self {
            Self::Send(r) => &r.comment,
            Self::Check(r) => &r.comment,
        }
    }

    /// Binding call that produced this response.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Send(_) => "order_send",
            Self::Check(_) => "order_check",
        }
    }

    fn is_success(&self) -> bool {
        match self {
            Self::Send(r) => r.retcode == retcode::DONE,
            Self::Check(r) => r.retcode == retcode::CHECK_OK,
        }
    }

    /// Flattened record form (`request_*` fields for the echoed request).
    pub fn to_record(&self) -> Record {
        match self {
            Self::Send(r) => r.to_record(),
            Self::Check(r) => r.to_record(),
        }
    }
}

/// Classified order result. Aborted orders are errors, not outcomes.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    Done(OrderResponse),
    Skipped(OrderResponse),
}

impl OrderOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    pub fn response(&self) -> &OrderResponse {
        match self {
            Self::Done(r) | Self::Skipped(r) => r,
        }
    }

    pub fn into_response(self) -> OrderResponse {
        match self {
            Self::Done(r) | Self::Skipped(r) => r,
        }
    }
}

/// Classify a response by retcode.
pub fn classify(response: OrderResponse) -> Mt5Result<OrderOutcome> {
    let operation = response.operation();
    let code = response.retcode();

    if response.is_success() {
        info!(operation, retcode = code, "Order accepted");
        Metrics::order_outcome(operation, "done");
        return Ok(OrderOutcome::Done(response));
    }

    if matches!(code, retcode::TRADE_DISABLED | retcode::MARKET_CLOSED) {
        warn!(
            operation,
            retcode = code,
            "{operation}() failed and skipped. <= `{}`",
            response.comment()
        );
        Metrics::order_outcome(operation, "skipped");
        return Ok(OrderOutcome::Skipped(response));
    }

    error!(
        operation,
        retcode = code,
        comment = response.comment(),
        "Order aborted"
    );
    Metrics::order_outcome(operation, "aborted");
    Err(Mt5Error::TradingAborted {
        operation: operation.to_string(),
        retcode: code,
        comment: response.comment().to_string(),
    })
}

/// Symbols to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolSelector {
    One(String),
    Many(Vec<String>),
    /// Every symbol the terminal knows.
    All,
}

impl From<&str> for SymbolSelector {
    fn from(symbol: &str) -> Self {
        Self::One(symbol.to_string())
    }
}

impl From<Vec<String>> for SymbolSelector {
    fn from(symbols: Vec<String>) -> Self {
        Self::Many(symbols)
    }
}

/// Market order parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketOrder {
    pub symbol: String,
    pub volume: f64,
    pub side: OrderSide,
    pub filling: Option<OrderFilling>,
    pub time: Option<OrderTime>,
}

impl MarketOrder {
    pub fn new(symbol: impl Into<String>, volume: f64, side: OrderSide) -> Self {
        Self {
            symbol: symbol.into(),
            volume,
            side,
            filling: None,
            time: None,
        }
    }

    #[must_use]
    pub fn with_filling(mut self, filling: OrderFilling) -> Self {
        self.filling = Some(filling);
        self
    }

    #[must_use]
    pub fn with_time(mut self, time: OrderTime) -> Self {
        self.time = Some(time);
        self
    }
}

fn round_to_digits(value: f64, digits: i64) -> f64 {
    let factor = 10f64.powi(digits.clamp(0, 15) as i32);
    (value * factor).round() / factor
}

/// Direction of `position`; `None` for an unknown position type.
pub(crate) fn position_side(position: &TradePosition) -> Option<OrderSide> {
    PositionType::from_code(position.r#type).map(OrderSide::from)
}

/// Side of the order that closes `position`.
fn closing_side(position: &TradePosition) -> OrderSide {
    match position_side(position) {
        Some(side) => side.opposite(),
        None => OrderSide::Buy,
    }
}

/// Query layer plus order orchestration.
pub struct TradingClient<T: Terminal> {
    data: DataClient<T>,
    trading: TradingConfig,
}

impl<T: Terminal> TradingClient<T> {
    pub fn new(connector: impl Fn() -> T + Send + 'static, config: &Mt5Config) -> Self {
        Self {
            data: DataClient::new(connector, config),
            trading: config.trading.clone(),
        }
    }

    /// Replace the delay used between connection retries.
    #[must_use]
    pub fn with_sleep(self, sleep: impl Fn(Duration) + Send + 'static) -> Self {
        Self {
            data: self.data.with_sleep(sleep),
            trading: self.trading,
        }
    }

    pub fn data(&self) -> &DataClient<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut DataClient<T> {
        &mut self.data
    }

    pub fn client(&self) -> &Mt5Client<T> {
        self.data.client()
    }

    pub fn trading_config(&self) -> &TradingConfig {
        &self.trading
    }

    pub fn open_with_retry(&mut self) -> Mt5Result<()> {
        self.data.open_with_retry()
    }

    pub fn close(&mut self) {
        self.data.close();
    }

    /// Configured magic/deviation with the caller's overrides on top.
    fn effective_overrides(&self, overrides: &RequestOverrides) -> RequestOverrides {
        RequestOverrides {
            comment: overrides.comment.clone(),
            magic: overrides.magic.or(self.trading.magic),
            deviation: overrides.deviation.or(self.trading.deviation),
        }
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Validate (`order_check`) or submit (`order_send`) and classify.
    pub fn submit_or_validate(
        &self,
        request: &TradeRequest,
        validate_only: bool,
    ) -> Mt5Result<OrderOutcome> {
        debug!(?request, validate_only, "Dispatching order request");
        let response = if validate_only {
            OrderResponse::Check(self.client().order_check(request)?)
        } else {
            OrderResponse::Send(self.client().order_send(request)?)
        };
        classify(response)
    }

    // ------------------------------------------------------------------
    // Position closing
    // ------------------------------------------------------------------

    /// Close every open position of the selected symbols with an
    /// opposite-side market order.
    ///
    /// Results keep symbol order, and position order within a symbol. A
    /// symbol without positions maps to an empty list. The first aborted
    /// order stops the run.
    pub fn close_positions(
        &self,
        selector: &SymbolSelector,
        overrides: &RequestOverrides,
        validate_only: bool,
    ) -> Mt5Result<Vec<(String, Vec<OrderOutcome>)>> {
        let symbols = match selector {
            SymbolSelector::One(symbol) => vec![symbol.clone()],
            SymbolSelector::Many(symbols) => symbols.clone(),
            SymbolSelector::All => self
                .client()
                .symbols_get(None)?
                .into_iter()
                .map(|s| s.name)
                .collect(),
        };
        info!(count = symbols.len(), "Fetching and closing positions");

        let overrides = self.effective_overrides(overrides);
        symbols
            .into_iter()
            .map(|symbol| {
                let outcomes = self.close_symbol_positions(&symbol, &overrides, validate_only)?;
                Ok((symbol, outcomes))
            })
            .collect()
    }

    fn close_symbol_positions(
        &self,
        symbol: &str,
        overrides: &RequestOverrides,
        validate_only: bool,
    ) -> Mt5Result<Vec<OrderOutcome>> {
        let positions = self.client().positions_get(&OpenFilter::symbol(symbol))?;
        if positions.is_empty() {
            warn!(symbol, "No open positions found");
            return Ok(Vec::new());
        }

        info!(symbol, count = positions.len(), "Closing open positions");
        positions
            .iter()
            .map(|position| {
                let request = TradeRequest::new(
                    TradeAction::Deal,
                    position.symbol.clone(),
                    position.volume,
                    closing_side(position).order_type(),
                )
                .with_filling(self.trading.filling_mode)
                .with_time(OrderTime::Gtc)
                .with_position(position.ticket)
                .with_overrides(overrides);
                self.submit_or_validate(&request, validate_only)
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Order placement
    // ------------------------------------------------------------------

    /// Market order. Unset filling and time policies fall back to the
    /// configured ones.
    pub fn place_market_order(
        &self,
        order: &MarketOrder,
        overrides: &RequestOverrides,
        validate_only: bool,
    ) -> Mt5Result<OrderOutcome> {
        let request = TradeRequest::new(
            TradeAction::Deal,
            order.symbol.clone(),
            order.volume,
            order.side.order_type(),
        )
        .with_filling(order.filling.unwrap_or(self.trading.filling_mode))
        .with_time(order.time.unwrap_or(self.trading.time_mode))
        .with_overrides(&self.effective_overrides(overrides));
        self.submit_or_validate(&request, validate_only)
    }

    /// Change SL/TP of the symbol's open positions.
    ///
    /// New levels are rounded to the symbol's digits; `None` keeps the
    /// position's current level. `tickets` narrows the positions touched.
    /// Positions already at the requested levels are left alone.
    pub fn update_sltp(
        &self,
        symbol: &str,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
        tickets: Option<&[i64]>,
        overrides: &RequestOverrides,
        validate_only: bool,
    ) -> Mt5Result<Vec<OrderOutcome>> {
        let positions: Vec<TradePosition> = self
            .client()
            .positions_get(&OpenFilter::symbol(symbol))?
            .into_iter()
            .filter(|p| tickets.map_or(true, |t| t.contains(&p.ticket)))
            .collect();
        if positions.is_empty() {
            warn!(symbol, ?tickets, "No open positions found");
            return Ok(Vec::new());
        }

        let digits = self.client().symbol_info(symbol)?.digits;
        let sl = stop_loss.map(|v| round_to_digits(v, digits));
        let tp = take_profit.map(|v| round_to_digits(v, digits));
        let overrides = self.effective_overrides(overrides);

        let requests: Vec<TradeRequest> = positions
            .iter()
            .filter_map(|p| {
                let new_sl = sl.unwrap_or(p.sl);
                let new_tp = tp.unwrap_or(p.tp);
                if new_sl == p.sl && new_tp == p.tp {
                    return None;
                }
                let side = position_side(p).unwrap_or(OrderSide::Sell);
                Some(
                    TradeRequest::new(TradeAction::Sltp, p.symbol.clone(), p.volume, side.order_type())
                        .with_position(p.ticket)
                        .with_sl(new_sl)
                        .with_tp(new_tp)
                        .with_overrides(&overrides),
                )
            })
            .collect();

        if requests.is_empty() {
            info!(symbol, ?sl, ?tp, "No positions to update");
            return Ok(Vec::new());
        }
        requests
            .iter()
            .map(|r| self.submit_or_validate(r, validate_only))
            .collect()
    }

    // ------------------------------------------------------------------
    // Performance
    // ------------------------------------------------------------------

    /// Statistics over deals that closed exposure in `[date_from, date_to]`.
    pub fn performance(
        &self,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
        symbol: Option<&str>,
    ) -> Mt5Result<PerformanceReport> {
        let mut query = HistoryQuery::range(date_from, date_to);
        if let Some(symbol) = symbol {
            query = query.with_symbol(symbol);
        }
        let deals = self
            .data
            .history_deals_table(&query, &FrameOptions::default())?
            .filter(|deal| {
                let is_trade = deal
                    .get("type")
                    .and_then(|v| v.as_i64())
                    .is_some_and(|code| DealType::from_code(code).is_trade());
                let closes = deal
                    .get("entry")
                    .and_then(|v| v.as_i64())
                    .and_then(DealEntry::from_code)
                    .is_some_and(|entry| entry != DealEntry::In);
                is_trade && closes
            });

        let rows = analytics::deal_rows(&deals)?;
        Ok(PerformanceReport::from_deals(&rows))
    }
}

impl<T: Terminal> Connectable for TradingClient<T> {
    fn connect(&mut self) -> Mt5Result<()> {
        self.open_with_retry()
    }

    fn disconnect(&mut self) {
        self.close();
    }
}
