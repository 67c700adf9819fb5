//! Margin-based sizing and market-data conveniences.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::warn;

use mt5_client::HistoryQuery;
use mt5_core::{
    CopyTicks, DealType, Mt5Error, Mt5Result, OpenFilter, OrderSide, Terminal, Timeframe,
    TradePosition, ValidationError,
};
use mt5_frame::{to_records, FrameOptions, Pipeline, Record, Table, ToRecord};

use crate::trading::{position_side, TradingClient};

/// Smallest tradable volume and the margin it requires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MinimumMargin {
    pub volume: f64,
    pub margin: f64,
}

/// Open position with its exposure measured against the latest tick.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionMetrics {
    pub position: TradePosition,
    /// Seconds from the position's open time to the last tick.
    pub elapsed_seconds: i64,
    /// `None` for a position type that is neither buy nor sell.
    pub side: Option<OrderSide>,
    /// Current per-lot margin for the position's side times its volume.
    pub margin: f64,
    pub signed_volume: f64,
    pub signed_margin: f64,
    /// Relative move of the underlying since open, positive when it favours
    /// the position. `None` when the open price is zero.
    pub underlier_profit_ratio: Option<f64>,
}

impl ToRecord for PositionMetrics {
    fn to_record(&self) -> Record {
        let mut record = self.position.to_record();
        record.set("elapsed_seconds", self.elapsed_seconds);
        record.set("buy", self.side == Some(OrderSide::Buy));
        record.set("sell", self.side == Some(OrderSide::Sell));
        record.set("margin", self.margin);
        record.set("signed_volume", self.signed_volume);
        record.set("signed_margin", self.signed_margin);
        record.set("underlier_profit_ratio", self.underlier_profit_ratio);
        record
    }
}

fn epoch_seconds(epoch: i64) -> Mt5Result<DateTime<Utc>> {
    DateTime::from_timestamp(epoch, 0)
        .ok_or_else(|| Mt5Error::from(ValidationError::InvalidTimestamp(epoch)))
}

impl<T: Terminal> TradingClient<T> {
    fn reference_price(&self, symbol: &str, side: OrderSide) -> Mt5Result<f64> {
        let tick = self.client().symbol_info_tick(symbol)?;
        Ok(match side {
            OrderSide::Buy => tick.ask,
            OrderSide::Sell => tick.bid,
        })
    }

    /// Margin for the symbol's minimum volume, priced at ask (buy) or bid
    /// (sell). A margin the terminal cannot compute is reported as zero.
    pub fn minimum_order_margin(&self, symbol: &str, side: OrderSide) -> Mt5Result<MinimumMargin> {
        let volume = self.client().symbol_info(symbol)?.volume_min;
        let price = self.reference_price(symbol, side)?;

        let margin = match self
            .client()
            .order_calc_margin(side.order_type(), symbol, volume, price)
        {
            Ok(margin) => margin,
            Err(Mt5Error::Binding(_)) => 0.0,
            Err(e) => return Err(e),
        };
        if margin == 0.0 {
            warn!(symbol, %side, "No margin available");
        }
        Ok(MinimumMargin { volume, margin })
    }

    /// Largest multiple of the minimum volume that `margin` covers.
    pub fn volume_for_margin(&self, symbol: &str, margin: f64, side: OrderSide) -> Mt5Result<f64> {
        let minimum = self.minimum_order_margin(symbol, side)?;
        if minimum.margin == 0.0 {
            return Ok(0.0);
        }
        Ok((margin / minimum.margin).floor() * minimum.volume)
    }

    /// `(ask - bid) / mid`.
    pub fn spread_ratio(&self, symbol: &str) -> Mt5Result<f64> {
        let tick = self.client().symbol_info_tick(symbol)?;
        Ok((tick.ask - tick.bid) / (tick.ask + tick.bid) * 2.0)
    }

    /// Absolute signed margin of the symbol's open positions plus a
    /// prospective one, as a fraction of equity. Zero when equity is zero.
    pub fn new_position_margin_ratio(
        &self,
        symbol: &str,
        side: Option<OrderSide>,
        volume: f64,
    ) -> Mt5Result<f64> {
        let equity = self.client().account_info()?.equity;
        if equity == 0.0 {
            return Ok(0.0);
        }

        let current: f64 = self
            .positions_with_metrics(symbol)?
            .iter()
            .map(|m| m.signed_margin)
            .sum();

        let prospective = match side {
            Some(side) if volume != 0.0 => {
                let price = self.reference_price(symbol, side)?;
                side.sign()
                    * self
                        .client()
                        .order_calc_margin(side.order_type(), symbol, volume, price)?
            }
            _ => 0.0,
        };

        Ok(((current + prospective) / equity).abs())
    }

    /// Open positions of `symbol` with elapsed time, signed volume, signed
    /// margin and underlying move. Margins use one-lot quotes at ask (buy)
    /// and bid (sell).
    pub fn positions_with_metrics(&self, symbol: &str) -> Mt5Result<Vec<PositionMetrics>> {
        let positions = self.client().positions_get(&OpenFilter::symbol(symbol))?;
        if positions.is_empty() {
            return Ok(Vec::new());
        }

        let tick = self.client().symbol_info_tick(symbol)?;
        let buy_margin =
            self.client()
                .order_calc_margin(OrderSide::Buy.order_type(), symbol, 1.0, tick.ask)?;
        let sell_margin =
            self.client()
                .order_calc_margin(OrderSide::Sell.order_type(), symbol, 1.0, tick.bid)?;

        Ok(positions
            .into_iter()
            .map(|position| {
                let side = position_side(&position);
                let sign = side.map_or(0.0, |s| s.sign());
                let per_lot = match side {
                    Some(OrderSide::Buy) => buy_margin,
                    Some(OrderSide::Sell) => sell_margin,
                    None => 0.0,
                };
                let margin = per_lot * position.volume;
                let underlier_profit_ratio = (position.price_open != 0.0)
                    .then(|| (position.price_current / position.price_open - 1.0) * sign);
                PositionMetrics {
                    elapsed_seconds: tick.time - position.time,
                    side,
                    margin,
                    signed_volume: position.volume * sign,
                    signed_margin: margin * sign,
                    underlier_profit_ratio,
                    position,
                }
            })
            .collect())
    }

    pub fn positions_with_metrics_records(
        &self,
        symbol: &str,
        options: &FrameOptions,
    ) -> Mt5Result<Vec<Record>> {
        let pipeline = Pipeline::from_options(options);
        Ok(to_records(&self.positions_with_metrics(symbol)?)
            .into_iter()
            .map(|record| pipeline.run_record(record))
            .collect())
    }

    pub fn positions_with_metrics_table(
        &self,
        symbol: &str,
        options: &FrameOptions,
    ) -> Mt5Result<Table> {
        Pipeline::from_options(options).run(to_records(&self.positions_with_metrics(symbol)?))
    }

    // ------------------------------------------------------------------
    // Market data
    // ------------------------------------------------------------------

    /// Latest `count` bars, keyed by `time`. `granularity` is a timeframe
    /// name such as `M1` or `H4`.
    pub fn latest_rates(&self, symbol: &str, granularity: &str, count: i64) -> Mt5Result<Table> {
        let timeframe = Timeframe::from_granularity(granularity)
            .ok_or_else(|| ValidationError::UnsupportedGranularity(granularity.to_string()))?;
        self.data().rates_from_pos_table(
            symbol,
            timeframe,
            0,
            count,
            &FrameOptions::default().with_key(&["time"]),
        )
    }

    /// Ticks within `seconds` of the last tick, keyed by `time_msc`.
    pub fn latest_ticks(&self, symbol: &str, seconds: i64) -> Mt5Result<Table> {
        let last = epoch_seconds(self.client().symbol_info_tick(symbol)?.time)?;
        let window = Duration::seconds(seconds);
        self.data().ticks_range_table(
            symbol,
            last - window,
            last + window,
            CopyTicks::All,
            &FrameOptions::default().with_key(&["time_msc"]),
        )
    }

    /// Buy/sell deals with a non-zero entry within `history_seconds` of the
    /// last tick, keyed by `ticket`.
    pub fn entry_deals(&self, symbol: &str, history_seconds: i64) -> Mt5Result<Table> {
        let last = epoch_seconds(self.client().symbol_info_tick(symbol)?.time)?;
        let window = Duration::seconds(history_seconds);
        let query = HistoryQuery::range(last - window, last + window).with_symbol(symbol);
        let deals = self
            .data()
            .history_deals_table(&query, &FrameOptions::default().with_key(&["ticket"]))?;
        Ok(deals.filter(|deal| {
            let entry = deal.get("entry").and_then(|v| v.as_i64()).unwrap_or(0);
            let is_trade = deal
                .get("type")
                .and_then(|v| v.as_i64())
                .is_some_and(|code| DealType::from_code(code).is_trade());
            entry != 0 && is_trade
        }))
    }
}
