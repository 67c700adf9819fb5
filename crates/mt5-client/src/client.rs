//! Typed query facade over the terminal binding.
//!
//! One method per binding call. Each requires an initialized session and
//! turns a `None`/`false` result into [`mt5_core::Mt5Error::Binding`] with the call's
//! arguments as context.

use chrono::{DateTime, Utc};
use tracing::debug;

use mt5_core::{
    AccountInfo, BookEntry, ConnectionConfig, CopyTicks, HistoryFilter, Mt5Result,
    OpenFilter, OrderCheckResult, OrderSendResult, OrderType, Rate, SymbolInfo, Terminal,
    TerminalInfo, TerminalVersion, Tick, Timeframe, TradeDeal, TradeOrder, TradePosition,
    TradeRequest,
};

use crate::session::{Connectable, Session};

pub struct Mt5Client<T: Terminal> {
    session: Session<T>,
}

impl<T: Terminal> Mt5Client<T> {
    pub fn new(connector: impl Fn() -> T + Send + 'static, config: ConnectionConfig) -> Self {
        Self::from_session(Session::new(connector, config))
    }

    pub fn from_session(session: Session<T>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<T> {
        &mut self.session
    }

    pub fn into_session(self) -> Session<T> {
        self.session
    }

    fn call<R>(
        &self,
        operation: &str,
        context: impl FnOnce() -> String,
        f: impl FnOnce(&T) -> Option<R>,
    ) -> Mt5Result<R> {
        let terminal = self.session.terminal()?;
        match f(terminal) {
            Some(value) => Ok(value),
            None => {
                let context = context();
                Err(self
                    .session
                    .fail(operation, (!context.is_empty()).then_some(context)))
            }
        }
    }

    fn check(
        &self,
        operation: &str,
        context: impl FnOnce() -> String,
        f: impl FnOnce(&T) -> bool,
    ) -> Mt5Result<()> {
        self.call(operation, context, |t| f(t).then_some(()))
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn open(&mut self, config: &ConnectionConfig) -> Mt5Result<bool> {
        self.session.open(config)
    }

    pub fn open_with_retry(&mut self, config: &ConnectionConfig, retry_count: u32) -> Mt5Result<()> {
        self.session.open_with_retry(config, retry_count)
    }

    pub fn close(&mut self) {
        self.session.close();
    }

    pub fn login(
        &self,
        login: i64,
        password: &str,
        server: &str,
        timeout: Option<u64>,
    ) -> Mt5Result<bool> {
        self.session.login(login, password, server, timeout)
    }

    pub fn last_error(&self) -> (i32, String) {
        self.session.last_error()
    }

    // ------------------------------------------------------------------
    // Terminal and account
    // ------------------------------------------------------------------

    pub fn version(&self) -> Mt5Result<TerminalVersion> {
        self.call("version", String::new, |t| t.version())
    }

    pub fn account_info(&self) -> Mt5Result<AccountInfo> {
        self.call("account_info", String::new, |t| t.account_info())
    }

    pub fn terminal_info(&self) -> Mt5Result<TerminalInfo> {
        self.call("terminal_info", String::new, |t| t.terminal_info())
    }

    // ------------------------------------------------------------------
    // Symbols and market depth
    // ------------------------------------------------------------------

    pub fn symbols_total(&self) -> Mt5Result<i64> {
        self.call("symbols_total", String::new, |t| t.symbols_total())
    }

    pub fn symbols_get(&self, group: Option<&str>) -> Mt5Result<Vec<SymbolInfo>> {
        self.call(
            "symbols_get",
            || format!("group={}", group.unwrap_or_default()),
            |t| t.symbols_get(group),
        )
    }

    pub fn symbol_info(&self, symbol: &str) -> Mt5Result<SymbolInfo> {
        self.call(
            "symbol_info",
            || format!("symbol={symbol}"),
            |t| t.symbol_info(symbol),
        )
    }

    pub fn symbol_info_tick(&self, symbol: &str) -> Mt5Result<Tick> {
        self.call(
            "symbol_info_tick",
            || format!("symbol={symbol}"),
            |t| t.symbol_info_tick(symbol),
        )
    }

    pub fn symbol_select(&self, symbol: &str, enable: bool) -> Mt5Result<()> {
        self.check(
            "symbol_select",
            || format!("symbol={symbol}, enable={enable}"),
            |t| t.symbol_select(symbol, enable),
        )
    }

    pub fn market_book_add(&self, symbol: &str) -> Mt5Result<()> {
        self.check(
            "market_book_add",
            || format!("symbol={symbol}"),
            |t| t.market_book_add(symbol),
        )
    }

    pub fn market_book_release(&self, symbol: &str) -> Mt5Result<()> {
        self.check(
            "market_book_release",
            || format!("symbol={symbol}"),
            |t| t.market_book_release(symbol),
        )
    }

    pub fn market_book_get(&self, symbol: &str) -> Mt5Result<Vec<BookEntry>> {
        self.call(
            "market_book_get",
            || format!("symbol={symbol}"),
            |t| t.market_book_get(symbol),
        )
    }

    // ------------------------------------------------------------------
    // Rates and ticks
    // ------------------------------------------------------------------

    pub fn copy_rates_from(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        date_from: DateTime<Utc>,
        count: usize,
    ) -> Mt5Result<Vec<Rate>> {
        self.call(
            "copy_rates_from",
            || format!("symbol={symbol}, timeframe={timeframe}, date_from={date_from}, count={count}"),
            |t| t.copy_rates_from(symbol, timeframe, date_from, count),
        )
    }

    pub fn copy_rates_from_pos(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_pos: usize,
        count: usize,
    ) -> Mt5Result<Vec<Rate>> {
        self.call(
            "copy_rates_from_pos",
            || format!("symbol={symbol}, timeframe={timeframe}, start_pos={start_pos}, count={count}"),
            |t| t.copy_rates_from_pos(symbol, timeframe, start_pos, count),
        )
    }

    pub fn copy_rates_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
    ) -> Mt5Result<Vec<Rate>> {
        self.call(
            "copy_rates_range",
            || format!("symbol={symbol}, timeframe={timeframe}, date_from={date_from}, date_to={date_to}"),
            |t| t.copy_rates_range(symbol, timeframe, date_from, date_to),
        )
    }

    pub fn copy_ticks_from(
        &self,
        symbol: &str,
        date_from: DateTime<Utc>,
        count: usize,
        flags: CopyTicks,
    ) -> Mt5Result<Vec<Tick>> {
        self.call(
            "copy_ticks_from",
            || format!("symbol={symbol}, date_from={date_from}, count={count}, flags={flags}"),
            |t| t.copy_ticks_from(symbol, date_from, count, flags),
        )
    }

    pub fn copy_ticks_range(
        &self,
        symbol: &str,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
        flags: CopyTicks,
    ) -> Mt5Result<Vec<Tick>> {
        self.call(
            "copy_ticks_range",
            || format!("symbol={symbol}, date_from={date_from}, date_to={date_to}, flags={flags}"),
            |t| t.copy_ticks_range(symbol, date_from, date_to, flags),
        )
    }

    // ------------------------------------------------------------------
    // Orders and positions
    // ------------------------------------------------------------------

    pub fn orders_total(&self) -> Mt5Result<i64> {
        self.call("orders_total", String::new, |t| t.orders_total())
    }

    pub fn orders_get(&self, filter: &OpenFilter) -> Mt5Result<Vec<TradeOrder>> {
        self.call("orders_get", || filter.to_string(), |t| t.orders_get(filter))
    }

    pub fn order_calc_margin(
        &self,
        order_type: OrderType,
        symbol: &str,
        volume: f64,
        price: f64,
    ) -> Mt5Result<f64> {
        self.call(
            "order_calc_margin",
            || {
                format!(
                    "action={}, symbol={symbol}, volume={volume}, price={price}",
                    order_type.code()
                )
            },
            |t| t.order_calc_margin(order_type, symbol, volume, price),
        )
    }

    pub fn order_calc_profit(
        &self,
        order_type: OrderType,
        symbol: &str,
        volume: f64,
        price_open: f64,
        price_close: f64,
    ) -> Mt5Result<f64> {
        self.call(
            "order_calc_profit",
            || {
                format!(
                    "action={}, symbol={symbol}, volume={volume}, \
                     price_open={price_open}, price_close={price_close}",
                    order_type.code()
                )
            },
            |t| t.order_calc_profit(order_type, symbol, volume, price_open, price_close),
        )
    }

    pub fn order_check(&self, request: &TradeRequest) -> Mt5Result<OrderCheckResult> {
        debug!(?request, "order_check");
        self.call(
            "order_check",
            || format!("request={request:?}"),
            |t| t.order_check(request),
        )
    }

    pub fn order_send(&self, request: &TradeRequest) -> Mt5Result<OrderSendResult> {
        debug!(?request, "order_send");
        self.call(
            "order_send",
            || format!("request={request:?}"),
            |t| t.order_send(request),
        )
    }

    pub fn positions_total(&self) -> Mt5Result<i64> {
        self.call("positions_total", String::new, |t| t.positions_total())
    }

    pub fn positions_get(&self, filter: &OpenFilter) -> Mt5Result<Vec<TradePosition>> {
        self.call(
            "positions_get",
            || filter.to_string(),
            |t| t.positions_get(filter),
        )
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    pub fn history_orders_total(
        &self,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
    ) -> Mt5Result<i64> {
        self.call(
            "history_orders_total",
            || format!("date_from={date_from}, date_to={date_to}"),
            |t| t.history_orders_total(date_from, date_to),
        )
    }

    pub fn history_orders_get(&self, filter: &HistoryFilter) -> Mt5Result<Vec<TradeOrder>> {
        self.call(
            "history_orders_get",
            || filter.to_string(),
            |t| t.history_orders_get(filter),
        )
    }

    pub fn history_deals_total(
        &self,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
    ) -> Mt5Result<i64> {
        self.call(
            "history_deals_total",
            || format!("date_from={date_from}, date_to={date_to}"),
            |t| t.history_deals_total(date_from, date_to),
        )
    }

    pub fn history_deals_get(&self, filter: &HistoryFilter) -> Mt5Result<Vec<TradeDeal>> {
        self.call(
            "history_deals_get",
            || filter.to_string(),
            |t| t.history_deals_get(filter),
        )
    }
}

impl<T: Terminal> Connectable for Mt5Client<T> {
    fn connect(&mut self) -> Mt5Result<()> {
        self.session.connect()
    }

    fn disconnect(&mut self) {
        self.session.close();
    }
}

impl<T: Terminal> From<Session<T>> for Mt5Client<T> {
    fn from(session: Session<T>) -> Self {
        Self::from_session(session)
    }
}
