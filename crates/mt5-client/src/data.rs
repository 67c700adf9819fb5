//! Record and table forms of every query.
//!
//! [`DataClient`] validates scalar inputs, calls the typed client, and runs
//! the results through a [`Pipeline`] built from the caller's
//! [`FrameOptions`]. Listing calls that match nothing return an empty table.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::warn;

use mt5_core::{
    ConnectionConfig, CopyTicks, Mt5Result, OpenFilter, OrderType, Terminal, Timeframe,
    TradeRequest,
};
use mt5_frame::{to_records, FrameOptions, Pipeline, Record, Table, ToRecord};

use crate::client::Mt5Client;
use crate::config::Mt5Config;
use crate::session::{Connectable, Session};
use crate::validate::{self, HistoryQuery};

fn records_of<S: ToRecord>(items: &[S], options: &FrameOptions) -> Vec<Record> {
    let pipeline = Pipeline::from_options(options);
    to_records(items)
        .into_iter()
        .map(|r| pipeline.run_record(r))
        .collect()
}

fn table_of<S: ToRecord>(items: &[S], options: &FrameOptions) -> Mt5Result<Table> {
    Pipeline::from_options(options).run(to_records(items))
}

fn record_of<S: ToRecord>(item: &S, options: &FrameOptions) -> Record {
    Pipeline::from_options(options).run_record(item.to_record())
}

fn warn_if_empty<S>(operation: &str, items: &[S]) {
    if items.is_empty() {
        warn!(operation, "No results");
    }
}

pub struct DataClient<T: Terminal> {
    client: Mt5Client<T>,
    retry_count: u32,
}

impl<T: Terminal> DataClient<T> {
    pub fn new(connector: impl Fn() -> T + Send + 'static, config: &Mt5Config) -> Self {
        Self {
            client: Mt5Client::new(connector, config.connection.clone()),
            retry_count: config.retry_count,
        }
    }

    /// Replace the delay used between connection retries.
    #[must_use]
    pub fn with_sleep(self, sleep: impl Fn(Duration) + Send + 'static) -> Self {
        let Self {
            client,
            retry_count,
        } = self;
        let session: Session<T> = client.into_session().with_sleep(sleep);
        Self {
            client: Mt5Client::from_session(session),
            retry_count,
        }
    }

    pub fn client(&self) -> &Mt5Client<T> {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut Mt5Client<T> {
        &mut self.client
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Open with the configured connection parameters and retry count.
    pub fn open_with_retry(&mut self) -> Mt5Result<()> {
        let config: ConnectionConfig = self.client.session().config().clone();
        self.client.open_with_retry(&config, self.retry_count)
    }

    pub fn close(&mut self) {
        self.client.close();
    }

    // ------------------------------------------------------------------
    // Terminal and account
    // ------------------------------------------------------------------

    pub fn version_record(&self) -> Mt5Result<Record> {
        Ok(self.client.version()?.to_record())
    }

    pub fn version_table(&self) -> Mt5Result<Table> {
        Ok(Table::from_records(vec![self.version_record()?]))
    }

    pub fn last_error_record(&self) -> Record {
        let (code, description) = self.client.last_error();
        Record::new()
            .with("error_code", i64::from(code))
            .with("error_description", description)
    }

    pub fn last_error_table(&self) -> Table {
        Table::from_records(vec![self.last_error_record()])
    }

    pub fn account_info_record(&self, options: &FrameOptions) -> Mt5Result<Record> {
        Ok(record_of(&self.client.account_info()?, options))
    }

    pub fn account_info_table(&self, options: &FrameOptions) -> Mt5Result<Table> {
        table_of(&[self.client.account_info()?], options)
    }

    pub fn terminal_info_record(&self, options: &FrameOptions) -> Mt5Result<Record> {
        Ok(record_of(&self.client.terminal_info()?, options))
    }

    pub fn terminal_info_table(&self, options: &FrameOptions) -> Mt5Result<Table> {
        table_of(&[self.client.terminal_info()?], options)
    }

    // ------------------------------------------------------------------
    // Symbols and market depth
    // ------------------------------------------------------------------

    pub fn symbols_records(
        &self,
        group: Option<&str>,
        options: &FrameOptions,
    ) -> Mt5Result<Vec<Record>> {
        Ok(records_of(&self.client.symbols_get(group)?, options))
    }

    pub fn symbols_table(&self, group: Option<&str>, options: &FrameOptions) -> Mt5Result<Table> {
        let symbols = self.client.symbols_get(group)?;
        warn_if_empty("symbols_get", &symbols);
        table_of(&symbols, options)
    }

    pub fn symbol_info_record(&self, symbol: &str, options: &FrameOptions) -> Mt5Result<Record> {
        Ok(record_of(&self.client.symbol_info(symbol)?, options))
    }

    pub fn symbol_info_table(&self, symbol: &str, options: &FrameOptions) -> Mt5Result<Table> {
        table_of(&[self.client.symbol_info(symbol)?], options)
    }

    pub fn symbol_info_tick_record(
        &self,
        symbol: &str,
        options: &FrameOptions,
    ) -> Mt5Result<Record> {
        Ok(record_of(&self.client.symbol_info_tick(symbol)?, options))
    }

    pub fn symbol_info_tick_table(&self, symbol: &str, options: &FrameOptions) -> Mt5Result<Table> {
        table_of(&[self.client.symbol_info_tick(symbol)?], options)
    }

    pub fn market_book_records(
        &self,
        symbol: &str,
        options: &FrameOptions,
    ) -> Mt5Result<Vec<Record>> {
        Ok(records_of(&self.client.market_book_get(symbol)?, options))
    }

    pub fn market_book_table(&self, symbol: &str, options: &FrameOptions) -> Mt5Result<Table> {
        table_of(&self.client.market_book_get(symbol)?, options)
    }

    // ------------------------------------------------------------------
    // Rates
    // ------------------------------------------------------------------

    pub fn rates_from_records(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        date_from: DateTime<Utc>,
        count: i64,
        options: &FrameOptions,
    ) -> Mt5Result<Vec<Record>> {
        let count = validate::positive_count(count)?;
        let rates = self
            .client
            .copy_rates_from(symbol, timeframe, date_from, count)?;
        Ok(records_of(&rates, options))
    }

    pub fn rates_from_table(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        date_from: DateTime<Utc>,
        count: i64,
        options: &FrameOptions,
    ) -> Mt5Result<Table> {
        let count = validate::positive_count(count)?;
        let rates = self
            .client
            .copy_rates_from(symbol, timeframe, date_from, count)?;
        table_of(&rates, options)
    }

    pub fn rates_from_pos_records(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_pos: i64,
        count: i64,
        options: &FrameOptions,
    ) -> Mt5Result<Vec<Record>> {
        let count = validate::positive_count(count)?;
        let start_pos = validate::non_negative_position(start_pos)?;
        let rates = self
            .client
            .copy_rates_from_pos(symbol, timeframe, start_pos, count)?;
        Ok(records_of(&rates, options))
    }

    pub fn rates_from_pos_table(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_pos: i64,
        count: i64,
        options: &FrameOptions,
    ) -> Mt5Result<Table> {
        let count = validate::positive_count(count)?;
        let start_pos = validate::non_negative_position(start_pos)?;
        let rates = self
            .client
            .copy_rates_from_pos(symbol, timeframe, start_pos, count)?;
        table_of(&rates, options)
    }

    pub fn rates_range_records(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
        options: &FrameOptions,
    ) -> Mt5Result<Vec<Record>> {
        validate::date_range(date_from, date_to)?;
        let rates = self
            .client
            .copy_rates_range(symbol, timeframe, date_from, date_to)?;
        Ok(records_of(&rates, options))
    }

    pub fn rates_range_table(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
        options: &FrameOptions,
    ) -> Mt5Result<Table> {
        validate::date_range(date_from, date_to)?;
        let rates = self
            .client
            .copy_rates_range(symbol, timeframe, date_from, date_to)?;
        table_of(&rates, options)
    }

    // ------------------------------------------------------------------
    // Ticks
    // ------------------------------------------------------------------

    pub fn ticks_from_records(
        &self,
        symbol: &str,
        date_from: DateTime<Utc>,
        count: i64,
        flags: CopyTicks,
        options: &FrameOptions,
    ) -> Mt5Result<Vec<Record>> {
        let count = validate::positive_count(count)?;
        let ticks = self
            .client
            .copy_ticks_from(symbol, date_from, count, flags)?;
        Ok(records_of(&ticks, options))
    }

    pub fn ticks_from_table(
        &self,
        symbol: &str,
        date_from: DateTime<Utc>,
        count: i64,
        flags: CopyTicks,
        options: &FrameOptions,
    ) -> Mt5Result<Table> {
        let count = validate::positive_count(count)?;
        let ticks = self
            .client
            .copy_ticks_from(symbol, date_from, count, flags)?;
        table_of(&ticks, options)
    }

    pub fn ticks_range_records(
        &self,
        symbol: &str,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
        flags: CopyTicks,
        options: &FrameOptions,
    ) -> Mt5Result<Vec<Record>> {
        validate::date_range(date_from, date_to)?;
        let ticks = self
            .client
            .copy_ticks_range(symbol, date_from, date_to, flags)?;
        Ok(records_of(&ticks, options))
    }

    pub fn ticks_range_table(
        &self,
        symbol: &str,
        date_from: DateTime<Utc>,
        date_to: DateTime<Utc>,
        flags: CopyTicks,
        options: &FrameOptions,
    ) -> Mt5Result<Table> {
        validate::date_range(date_from, date_to)?;
        let ticks = self
            .client
            .copy_ticks_range(symbol, date_from, date_to, flags)?;
        table_of(&ticks, options)
    }

    // ------------------------------------------------------------------
    // Orders and positions
    // ------------------------------------------------------------------

    pub fn orders_records(
        &self,
        filter: &OpenFilter,
        options: &FrameOptions,
    ) -> Mt5Result<Vec<Record>> {
        Ok(records_of(&self.client.orders_get(filter)?, options))
    }

    pub fn orders_table(&self, filter: &OpenFilter, options: &FrameOptions) -> Mt5Result<Table> {
        let orders = self.client.orders_get(filter)?;
        warn_if_empty("orders_get", &orders);
        table_of(&orders, options)
    }

    pub fn positions_records(
        &self,
        filter: &OpenFilter,
        options: &FrameOptions,
    ) -> Mt5Result<Vec<Record>> {
        Ok(records_of(&self.client.positions_get(filter)?, options))
    }

    pub fn positions_table(&self, filter: &OpenFilter, options: &FrameOptions) -> Mt5Result<Table> {
        let positions = self.client.positions_get(filter)?;
        warn_if_empty("positions_get", &positions);
        table_of(&positions, options)
    }

    pub fn order_check_record(&self, request: &TradeRequest) -> Mt5Result<Record> {
        Ok(self.client.order_check(request)?.to_record())
    }

    pub fn order_check_table(&self, request: &TradeRequest) -> Mt5Result<Table> {
        Ok(Table::from_records(vec![self.order_check_record(request)?]))
    }

    pub fn order_send_record(&self, request: &TradeRequest) -> Mt5Result<Record> {
        Ok(self.client.order_send(request)?.to_record())
    }

    pub fn order_send_table(&self, request: &TradeRequest) -> Mt5Result<Table> {
        Ok(Table::from_records(vec![self.order_send_record(request)?]))
    }

    /// Margin for a hypothetical order. Volume and price must be positive.
    pub fn order_calc_margin(
        &self,
        order_type: OrderType,
        symbol: &str,
        volume: f64,
        price: f64,
    ) -> Mt5Result<f64> {
        validate::positive_value(volume, "volume")?;
        validate::positive_value(price, "price")?;
        self.client
            .order_calc_margin(order_type, symbol, volume, price)
    }

    /// Profit for a hypothetical round trip. Volume and prices must be
    /// positive.
    pub fn order_calc_profit(
        &self,
        order_type: OrderType,
        symbol: &str,
        volume: f64,
        price_open: f64,
        price_close: f64,
    ) -> Mt5Result<f64> {
        validate::positive_value(volume, "volume")?;
        validate::positive_value(price_open, "price_open")?;
        validate::positive_value(price_close, "price_close")?;
        self.client
            .order_calc_profit(order_type, symbol, volume, price_open, price_close)
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    pub fn history_orders_records(
        &self,
        query: &HistoryQuery,
        options: &FrameOptions,
    ) -> Mt5Result<Vec<Record>> {
        let filter = query.to_filter()?;
        Ok(records_of(&self.client.history_orders_get(&filter)?, options))
    }

    pub fn history_orders_table(
        &self,
        query: &HistoryQuery,
        options: &FrameOptions,
    ) -> Mt5Result<Table> {
        let filter = query.to_filter()?;
        let orders = self.client.history_orders_get(&filter)?;
        warn_if_empty("history_orders_get", &orders);
        table_of(&orders, options)
    }

    pub fn history_deals_records(
        &self,
        query: &HistoryQuery,
        options: &FrameOptions,
    ) -> Mt5Result<Vec<Record>> {
        let filter = query.to_filter()?;
        Ok(records_of(&self.client.history_deals_get(&filter)?, options))
    }

    pub fn history_deals_table(
        &self,
        query: &HistoryQuery,
        options: &FrameOptions,
    ) -> Mt5Result<Table> {
        let filter = query.to_filter()?;
        let deals = self.client.history_deals_get(&filter)?;
        warn_if_empty("history_deals_get", &deals);
        table_of(&deals, options)
    }
}

impl<T: Terminal> Connectable for DataClient<T> {
    fn connect(&mut self) -> Mt5Result<()> {
        self.open_with_retry()
    }

    fn disconnect(&mut self) {
        self.close();
    }
}
