//! Native structures returned by the terminal binding.
//!
//! Field names and integer encodings mirror the terminal. Times are epoch
//! seconds, `*_msc` fields are epoch milliseconds.

use serde::{Deserialize, Serialize};

use crate::constants::{OrderFilling, OrderTime, OrderType, TradeAction};

/// Terminal version triple.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TerminalVersion {
    pub version: i64,
    pub build: i64,
    pub release_date: String,
}

/// Trading account state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AccountInfo {
    pub login: i64,
    pub trade_mode: i64,
    pub leverage: i64,
    pub limit_orders: i64,
    pub margin_so_mode: i64,
    pub trade_allowed: bool,
    pub trade_expert: bool,
    pub margin_mode: i64,
    pub currency_digits: i64,
    pub fifo_close: bool,
    pub balance: f64,
    pub credit: f64,
    pub profit: f64,
    pub equity: f64,
    pub margin: f64,
    pub margin_free: f64,
    pub margin_level: f64,
    pub margin_so_call: f64,
    pub margin_so_so: f64,
    pub margin_initial: f64,
    pub margin_maintenance: f64,
    pub assets: f64,
    pub liabilities: f64,
    pub commission_blocked: f64,
    pub name: String,
    pub server: String,
    pub currency: String,
    pub company: String,
}

/// Terminal status and settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TerminalInfo {
    pub community_account: bool,
    pub community_connection: bool,
    pub connected: bool,
    pub dlls_allowed: bool,
    pub trade_allowed: bool,
    pub tradeapi_disabled: bool,
    pub email_enabled: bool,
    pub ftp_enabled: bool,
    pub notifications_enabled: bool,
    pub mqid: bool,
    pub build: i64,
    pub maxbars: i64,
    pub codepage: i64,
    pub ping_last: i64,
    pub community_balance: f64,
    pub retransmission: f64,
    pub company: String,
    pub name: String,
    pub language: String,
    pub path: String,
    pub data_path: String,
    pub commondata_path: String,
}

/// Symbol properties and current quote.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    pub description: String,
    pub path: String,
    pub currency_base: String,
    pub currency_profit: String,
    pub currency_margin: String,
    pub visible: bool,
    pub select: bool,
    pub custom: bool,
    pub digits: i64,
    pub spread: i64,
    pub spread_float: bool,
    pub trade_mode: i64,
    pub trade_calc_mode: i64,
    pub trade_exemode: i64,
    pub filling_mode: i64,
    pub expiration_mode: i64,
    pub order_mode: i64,
    pub time: i64,
    pub bid: f64,
    pub bidhigh: f64,
    pub bidlow: f64,
    pub ask: f64,
    pub askhigh: f64,
    pub asklow: f64,
    pub last: f64,
    pub point: f64,
    pub trade_tick_value: f64,
    pub trade_tick_size: f64,
    pub trade_contract_size: f64,
    pub volume_min: f64,
    pub volume_max: f64,
    pub volume_step: f64,
    pub swap_long: f64,
    pub swap_short: f64,
    pub margin_initial: f64,
    pub margin_maintenance: f64,
}

/// Last tick of a symbol, or one element of a tick series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Tick {
    pub time: i64,
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
    pub volume: i64,
    pub time_msc: i64,
    pub flags: i64,
    pub volume_real: f64,
}

/// One bar of a rate series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Rate {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub tick_volume: i64,
    pub spread: i64,
    pub real_volume: i64,
}

/// Depth of market entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BookEntry {
    pub r#type: i64,
    pub price: f64,
    pub volume: i64,
    pub volume_dbl: f64,
}

/// Active or historical order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TradeOrder {
    pub ticket: i64,
    pub time_setup: i64,
    pub time_setup_msc: i64,
    pub time_done: i64,
    pub time_done_msc: i64,
    pub time_expiration: i64,
    pub r#type: i64,
    pub type_time: i64,
    pub type_filling: i64,
    pub state: i64,
    pub magic: i64,
    pub position_id: i64,
    pub position_by_id: i64,
    pub reason: i64,
    pub volume_initial: f64,
    pub volume_current: f64,
    pub price_open: f64,
    pub sl: f64,
    pub tp: f64,
    pub price_current: f64,
    pub price_stoplimit: f64,
    pub symbol: String,
    pub comment: String,
    pub external_id: String,
}

/// Open position.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TradePosition {
    pub ticket: i64,
    pub time: i64,
    pub time_msc: i64,
    pub time_update: i64,
    pub time_update_msc: i64,
    pub r#type: i64,
    pub magic: i64,
    pub identifier: i64,
    pub reason: i64,
    pub volume: f64,
    pub price_open: f64,
    pub sl: f64,
    pub tp: f64,
    pub price_current: f64,
    pub swap: f64,
    pub profit: f64,
    pub symbol: String,
    pub comment: String,
    pub external_id: String,
}

/// Historical deal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TradeDeal {
    pub ticket: i64,
    pub order: i64,
    pub time: i64,
    pub time_msc: i64,
    pub r#type: i64,
    pub entry: i64,
    pub magic: i64,
    pub position_id: i64,
    pub reason: i64,
    pub volume: f64,
    pub price: f64,
    pub commission: f64,
    pub swap: f64,
    pub profit: f64,
    pub fee: f64,
    pub symbol: String,
    pub comment: String,
    pub external_id: String,
}

/// Order request passed to `order_check` / `order_send`.
///
/// `action`, `symbol`, `volume` and `type` are always present; everything
/// else is omitted from the request when unset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TradeRequest {
    pub action: i64,
    pub symbol: String,
    pub volume: f64,
    pub r#type: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magic: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stoplimit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sl: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deviation: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_filling: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_by: Option<i64>,
}

impl TradeRequest {
    /// Create a request with the four mandatory fields.
    #[must_use]
    pub fn new(
        action: TradeAction,
        symbol: impl Into<String>,
        volume: f64,
        order_type: OrderType,
    ) -> Self {
        Self {
            action: action.code(),
            symbol: symbol.into(),
            volume,
            r#type: order_type.code(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    #[must_use]
    pub fn with_sl(mut self, sl: f64) -> Self {
        self.sl = Some(sl);
        self
    }

    #[must_use]
    pub fn with_tp(mut self, tp: f64) -> Self {
        self.tp = Some(tp);
        self
    }

    #[must_use]
    pub fn with_filling(mut self, filling: OrderFilling) -> Self {
        self.type_filling = Some(filling.code());
        self
    }

    #[must_use]
    pub fn with_time(mut self, time: OrderTime) -> Self {
        self.type_time = Some(time.code());
        self
    }

    #[must_use]
    pub fn with_position(mut self, ticket: i64) -> Self {
        self.position = Some(ticket);
        self
    }

    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    #[must_use]
    pub fn with_magic(mut self, magic: i64) -> Self {
        self.magic = Some(magic);
        self
    }

    #[must_use]
    pub fn with_deviation(mut self, deviation: i64) -> Self {
        self.deviation = Some(deviation);
        self
    }

    /// Apply passthrough overrides; `None` leaves the current value.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &RequestOverrides) -> Self {
        if let Some(comment) = &overrides.comment {
            self.comment = Some(comment.clone());
        }
        if let Some(magic) = overrides.magic {
            self.magic = Some(magic);
        }
        if let Some(deviation) = overrides.deviation {
            self.deviation = Some(deviation);
        }
        self
    }
}

/// Caller-supplied passthrough fields applied to generated requests.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestOverrides {
    pub comment: Option<String>,
    pub magic: Option<i64>,
    pub deviation: Option<i64>,
}

/// Result of `order_send`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrderSendResult {
    pub retcode: u32,
    pub deal: i64,
    pub order: i64,
    pub volume: f64,
    pub price: f64,
    pub bid: f64,
    pub ask: f64,
    pub comment: String,
    pub request_id: i64,
    pub retcode_external: i64,
    pub request: TradeRequest,
}

/// Result of `order_check`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrderCheckResult {
    pub retcode: u32,
    pub balance: f64,
    pub equity: f64,
    pub profit: f64,
    pub margin: f64,
    pub margin_free: f64,
    pub margin_level: f64,
    pub comment: String,
    pub request: TradeRequest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_request_builder() {
        let request = TradeRequest::new(TradeAction::Deal, "EURUSD", 0.1, OrderType::Sell)
            .with_filling(OrderFilling::Ioc)
            .with_time(OrderTime::Gtc)
            .with_position(42);

        assert_eq!(request.action, 1);
        assert_eq!(request.r#type, 1);
        assert_eq!(request.type_filling, Some(1));
        assert_eq!(request.type_time, Some(0));
        assert_eq!(request.position, Some(42));
        assert_eq!(request.sl, None);
    }

    #[test]
    fn test_overrides_keep_existing_values_when_unset() {
        let request = TradeRequest::new(TradeAction::Deal, "EURUSD", 0.1, OrderType::Buy)
            .with_comment("base")
            .with_overrides(&RequestOverrides {
                comment: None,
                magic: Some(7),
                deviation: Some(10),
            });

        assert_eq!(request.comment.as_deref(), Some("base"));
        assert_eq!(request.magic, Some(7));
        assert_eq!(request.deviation, Some(10));
    }

    #[test]
    fn test_unset_request_fields_are_not_serialized() {
        let request = TradeRequest::new(TradeAction::Sltp, "USDJPY", 0.0, OrderType::Buy)
            .with_sl(150.0);
        let text = toml::to_string(&request).unwrap();
        assert!(text.contains("sl = 150"));
        assert!(!text.contains("comment"));
    }
}
