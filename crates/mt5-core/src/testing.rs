//! Scriptable in-memory terminal for tests.
//!
//! `FakeTerminal` is cheap to clone; clones share state, so a test can hand
//! one clone to a session and inspect recorded calls through another.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::config::ConnectionConfig;
use crate::constants::{retcode, CopyTicks, OrderType, Timeframe};
use crate::terminal::{HistoryFilter, OpenFilter, Terminal};
use crate::types::{
    AccountInfo, BookEntry, OrderCheckResult, OrderSendResult, Rate, SymbolInfo, TerminalInfo,
    TerminalVersion, Tick, TradeDeal, TradeOrder, TradePosition, TradeRequest,
};

/// Error pair reported after a scripted failure.
pub const FAKE_ERROR: (i32, &str) = (-1, "Terminal call failed");

#[derive(Default)]
struct State {
    initialize_script: VecDeque<bool>,
    failing: HashSet<String>,
    last_error: (i32, String),

    version: TerminalVersion,
    account: AccountInfo,
    terminal: TerminalInfo,
    symbols: Vec<SymbolInfo>,
    ticks: HashMap<String, Tick>,
    tick_series: Vec<Tick>,
    rates: Vec<Rate>,
    book: Vec<BookEntry>,
    orders: Vec<TradeOrder>,
    positions: Vec<TradePosition>,
    history_orders: Vec<TradeOrder>,
    history_deals: Vec<TradeDeal>,
    margins: HashMap<String, f64>,
    profit: f64,
    send_retcodes: VecDeque<u32>,
    check_retcodes: VecDeque<u32>,

    calls: Vec<String>,
    sent: Vec<TradeRequest>,
    checked: Vec<TradeRequest>,
    open_filters: Vec<OpenFilter>,
    history_filters: Vec<HistoryFilter>,
    connect_configs: Vec<ConnectionConfig>,
}

/// In-memory [`Terminal`] with scripted responses and call recording.
#[derive(Clone)]
pub struct FakeTerminal {
    state: Arc<Mutex<State>>,
}

impl Default for FakeTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTerminal {
    pub fn new() -> Self {
        let state = State {
            last_error: (1, "Success".to_string()),
            version: TerminalVersion {
                version: 500,
                build: 4000,
                release_date: "1 Jan 2024".to_string(),
            },
            account: AccountInfo {
                login: 123456,
                balance: 10_000.0,
                equity: 10_000.0,
                currency: "USD".to_string(),
                ..AccountInfo::default()
            },
            terminal: TerminalInfo {
                connected: true,
                trade_allowed: true,
                ..TerminalInfo::default()
            },
            ..State::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    // ------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------

    /// Make `operation` report failure until [`FakeTerminal::recover`].
    pub fn fail(&self, operation: &str) {
        self.state.lock().failing.insert(operation.to_string());
    }

    pub fn recover(&self, operation: &str) {
        self.state.lock().failing.remove(operation);
    }

    /// Queue results for successive `initialize` calls. Once the queue is
    /// empty, `initialize` succeeds unless it was marked failing.
    pub fn script_initialize(&self, results: impl IntoIterator<Item = bool>) {
        self.state.lock().initialize_script.extend(results);
    }

    /// Queue retcodes for successive `order_send` calls (default `DONE`).
    pub fn script_send_retcodes(&self, codes: impl IntoIterator<Item = u32>) {
        self.state.lock().send_retcodes.extend(codes);
    }

    /// Queue retcodes for successive `order_check` calls (default `0`).
    pub fn script_check_retcodes(&self, codes: impl IntoIterator<Item = u32>) {
        self.state.lock().check_retcodes.extend(codes);
    }

    pub fn set_last_error(&self, code: i32, description: &str) {
        self.state.lock().last_error = (code, description.to_string());
    }

    pub fn set_account(&self, account: AccountInfo) {
        self.state.lock().account = account;
    }

    pub fn add_symbol(&self, symbol: SymbolInfo) {
        self.state.lock().symbols.push(symbol);
    }

    pub fn set_tick(&self, symbol: &str, tick: Tick) {
        self.state.lock().ticks.insert(symbol.to_string(), tick);
    }

    pub fn set_tick_series(&self, ticks: Vec<Tick>) {
        self.state.lock().tick_series = ticks;
    }

    pub fn set_rates(&self, rates: Vec<Rate>) {
        self.state.lock().rates = rates;
    }

    pub fn set_book(&self, book: Vec<BookEntry>) {
        self.state.lock().book = book;
    }

    pub fn add_order(&self, order: TradeOrder) {
        self.state.lock().orders.push(order);
    }

    pub fn add_position(&self, position: TradePosition) {
        self.state.lock().positions.push(position);
    }

    pub fn set_history_orders(&self, orders: Vec<TradeOrder>) {
        self.state.lock().history_orders = orders;
    }

    pub fn set_history_deals(&self, deals: Vec<TradeDeal>) {
        self.state.lock().history_deals = deals;
    }

    /// Margin for one lot of `symbol`; margins scale linearly with volume.
    /// Symbols without a margin cannot be priced.
    pub fn set_margin_per_lot(&self, symbol: &str, margin: f64) {
        self.state.lock().margins.insert(symbol.to_string(), margin);
    }

    pub fn set_profit(&self, profit: f64) {
        self.state.lock().profit = profit;
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Names of every binding call made, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.as_str() == operation)
            .count()
    }

    pub fn sent_requests(&self) -> Vec<TradeRequest> {
        self.state.lock().sent.clone()
    }

    pub fn checked_requests(&self) -> Vec<TradeRequest> {
        self.state.lock().checked.clone()
    }

    pub fn open_filters(&self) -> Vec<OpenFilter> {
        self.state.lock().open_filters.clone()
    }

    pub fn history_filters(&self) -> Vec<HistoryFilter> {
        self.state.lock().history_filters.clone()
    }

    pub fn connect_configs(&self) -> Vec<ConnectionConfig> {
        self.state.lock().connect_configs.clone()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Record the call; returns false (and sets the error pair) when the
    /// operation is scripted to fail.
    fn enter(&self, operation: &str) -> bool {
        let mut state = self.state.lock();
        state.calls.push(operation.to_string());
        if state.failing.contains(operation) {
            state.last_error = (FAKE_ERROR.0, FAKE_ERROR.1.to_string());
            return false;
        }
        true
    }

    fn answer<T>(&self, operation: &str, value: impl FnOnce(&State) -> T) -> Option<T> {
        if !self.enter(operation) {
            return None;
        }
        Some(value(&self.state.lock()))
    }
}

/// `*X*`-style glob match used for `group` filters.
fn glob_match(pattern: &str, text: &str) -> bool {
    let needle = pattern.trim_matches('*');
    match (pattern.starts_with('*'), pattern.ends_with('*')) {
        (true, true) => text.contains(needle),
        (true, false) => text.ends_with(needle),
        (false, true) => text.starts_with(needle),
        (false, false) => text == needle,
    }
}

fn matches_open(filter: &OpenFilter, symbol: &str, ticket: i64) -> bool {
    if let Some(wanted) = filter.ticket {
        return wanted == ticket;
    }
    if let Some(wanted) = &filter.symbol {
        return wanted == symbol;
    }
    if let Some(group) = &filter.group {
        return glob_match(group, symbol);
    }
    true
}

fn matches_history(
    filter: &HistoryFilter,
    symbol: &str,
    ticket: i64,
    position_id: i64,
    time: i64,
) -> bool {
    match filter {
        HistoryFilter::Ticket(wanted) => *wanted == ticket,
        HistoryFilter::Position(wanted) => *wanted == position_id,
        HistoryFilter::Range { from, to, group } => {
            time >= from.timestamp()
                && time <= to.timestamp()
                && group.as_deref().map_or(true, |g| glob_match(g, symbol))
        }
    }
}

fn send_comment(code: u32) -> &'static str {
    match code {
        retcode::DONE => "Request executed",
        retcode::TRADE_DISABLED => "Trade disabled",
        retcode::MARKET_CLOSED => "Market closed",
        retcode::NO_MONEY => "No money",
        _ => "Request rejected",
    }
}

impl Terminal for FakeTerminal {
    fn initialize(&self, config: &ConnectionConfig) -> bool {
        let ok = self.enter("initialize");
        let mut state = self.state.lock();
        state.connect_configs.push(config.clone());
        let scripted = state.initialize_script.pop_front().unwrap_or(true);
        if ok && !scripted {
            state.last_error = (-10003, "IPC initialize failed".to_string());
        }
        ok && scripted
    }

    fn login(&self, _login: i64, _password: &str, _server: &str, _timeout: Option<u64>) -> bool {
        self.enter("login")
    }

    fn shutdown(&self) {
        self.enter("shutdown");
    }

    fn last_error(&self) -> (i32, String) {
        self.state.lock().last_error.clone()
    }

    fn version(&self) -> Option<TerminalVersion> {
        self.answer("version", |s| s.version.clone())
    }

    fn account_info(&self) -> Option<AccountInfo> {
        self.answer("account_info", |s| s.account.clone())
    }

    fn terminal_info(&self) -> Option<TerminalInfo> {
        self.answer("terminal_info", |s| s.terminal.clone())
    }

    fn symbols_total(&self) -> Option<i64> {
        self.answer("symbols_total", |s| s.symbols.len() as i64)
    }

    fn symbols_get(&self, group: Option<&str>) -> Option<Vec<SymbolInfo>> {
        self.answer("symbols_get", |s| {
            s.symbols
                .iter()
                .filter(|info| group.map_or(true, |g| glob_match(g, &info.name)))
                .cloned()
                .collect()
        })
    }

    fn symbol_info(&self, symbol: &str) -> Option<SymbolInfo> {
        if !self.enter("symbol_info") {
            return None;
        }
        let state = self.state.lock();
        state.symbols.iter().find(|info| info.name == symbol).cloned()
    }

    fn symbol_info_tick(&self, symbol: &str) -> Option<Tick> {
        if !self.enter("symbol_info_tick") {
            return None;
        }
        self.state.lock().ticks.get(symbol).cloned()
    }

    fn symbol_select(&self, _symbol: &str, _enable: bool) -> bool {
        self.enter("symbol_select")
    }

    fn market_book_add(&self, _symbol: &str) -> bool {
        self.enter("market_book_add")
    }

    fn market_book_release(&self, _symbol: &str) -> bool {
        self.enter("market_book_release")
    }

    fn market_book_get(&self, _symbol: &str) -> Option<Vec<BookEntry>> {
        self.answer("market_book_get", |s| s.book.clone())
    }

    fn copy_rates_from(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
        _date_from: DateTime<Utc>,
        count: usize,
    ) -> Option<Vec<Rate>> {
        self.answer("copy_rates_from", |s| {
            s.rates.iter().take(count).cloned().collect()
        })
    }

    fn copy_rates_from_pos(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
        start_pos: usize,
        count: usize,
    ) -> Option<Vec<Rate>> {
        self.answer("copy_rates_from_pos", |s| {
            s.rates.iter().skip(start_pos).take(count).cloned().collect()
        })
    }

    fn copy_rates_range(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
    ) -> Option<Vec<Rate>> {
        self.answer("copy_rates_range", |s| {
            s.rates
                .iter()
                .filter(|r| r.time >= date_from.timestamp() && r.time <= date_to.timestamp())
                .cloned()
                .collect()
        })
    }

    fn copy_ticks_from(
        &self,
        _symbol: &str,
        _date_from: DateTime<Utc>,
        count: usize,
        _flags: CopyTicks,
    ) -> Option<Vec<Tick>> {
        self.answer("copy_ticks_from", |s| {
            s.tick_series.iter().take(count).cloned().collect()
        })
    }

    fn copy_ticks_range(
        &self,
        _symbol: &str,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
        _flags: CopyTicks,
    ) -> Option<Vec<Tick>> {
        self.answer("copy_ticks_range", |s| {
            s.tick_series
                .iter()
                .filter(|t| {
                    t.time_msc >= date_from.timestamp_millis()
                        && t.time_msc <= date_to.timestamp_millis()
                })
                .cloned()
                .collect()
        })
    }

    fn orders_total(&self) -> Option<i64> {
        self.answer("orders_total", |s| s.orders.len() as i64)
    }

    fn orders_get(&self, filter: &OpenFilter) -> Option<Vec<TradeOrder>> {
        self.state.lock().open_filters.push(filter.clone());
        self.answer("orders_get", |s| {
            s.orders
                .iter()
                .filter(|o| matches_open(filter, &o.symbol, o.ticket))
                .cloned()
                .collect()
        })
    }

    fn order_calc_margin(
        &self,
        _order_type: OrderType,
        symbol: &str,
        volume: f64,
        _price: f64,
    ) -> Option<f64> {
        if !self.enter("order_calc_margin") {
            return None;
        }
        self.state
            .lock()
            .margins
            .get(symbol)
            .map(|per_lot| per_lot * volume)
    }

    fn order_calc_profit(
        &self,
        _order_type: OrderType,
        _symbol: &str,
        _volume: f64,
        _price_open: f64,
        _price_close: f64,
    ) -> Option<f64> {
        self.answer("order_calc_profit", |s| s.profit)
    }

    fn order_check(&self, request: &TradeRequest) -> Option<OrderCheckResult> {
        if !self.enter("order_check") {
            return None;
        }
        let mut state = self.state.lock();
        state.checked.push(request.clone());
        let code = state.check_retcodes.pop_front().unwrap_or(retcode::CHECK_OK);
        Some(OrderCheckResult {
            retcode: code,
            balance: state.account.balance,
            equity: state.account.equity,
            margin_free: state.account.margin_free,
            comment: if code == retcode::CHECK_OK {
                "Done".to_string()
            } else {
                send_comment(code).to_string()
            },
            request: request.clone(),
            ..OrderCheckResult::default()
        })
    }

    fn order_send(&self, request: &TradeRequest) -> Option<OrderSendResult> {
        if !self.enter("order_send") {
            return None;
        }
        let mut state = self.state.lock();
        state.sent.push(request.clone());
        let code = state.send_retcodes.pop_front().unwrap_or(retcode::DONE);
        let sequence = state.sent.len() as i64;
        Some(OrderSendResult {
            retcode: code,
            deal: if code == retcode::DONE { sequence } else { 0 },
            order: sequence,
            volume: request.volume,
            price: request.price.unwrap_or_default(),
            comment: send_comment(code).to_string(),
            request: request.clone(),
            ..OrderSendResult::default()
        })
    }

    fn positions_total(&self) -> Option<i64> {
        self.answer("positions_total", |s| s.positions.len() as i64)
    }

    fn positions_get(&self, filter: &OpenFilter) -> Option<Vec<TradePosition>> {
        self.state.lock().open_filters.push(filter.clone());
        self.answer("positions_get", |s| {
            s.positions
                .iter()
                .filter(|p| matches_open(filter, &p.symbol, p.ticket))
                .cloned()
                .collect()
        })
    }

    fn history_orders_total(
        &self,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
    ) -> Option<i64> {
        self.answer("history_orders_total", |s| {
            s.history_orders
                .iter()
                .filter(|o| {
                    o.time_setup >= date_from.timestamp() && o.time_setup <= date_to.timestamp()
                })
                .count() as i64
        })
    }

    fn history_orders_get(&self, filter: &HistoryFilter) -> Option<Vec<TradeOrder>> {
        self.state.lock().history_filters.push(filter.clone());
        self.answer("history_orders_get", |s| {
            s.history_orders
                .iter()
                .filter(|o| matches_history(filter, &o.symbol, o.ticket, o.position_id, o.time_setup))
                .cloned()
                .collect()
        })
    }

    fn history_deals_total(
        &self,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
    ) -> Option<i64> {
        self.answer("history_deals_total", |s| {
            s.history_deals
                .iter()
                .filter(|d| d.time >= date_from.timestamp() && d.time <= date_to.timestamp())
                .count() as i64
        })
    }

    fn history_deals_get(&self, filter: &HistoryFilter) -> Option<Vec<TradeDeal>> {
        self.state.lock().history_filters.push(filter.clone());
        self.answer("history_deals_get", |s| {
            s.history_deals
                .iter()
                .filter(|d| matches_history(filter, &d.symbol, d.ticket, d.position_id, d.time))
                .cloned()
                .collect()
        })
    }
}
