//! Conversion of native terminal structs into records.

use chrono::{DateTime, Utc};
use mt5_core::{
    AccountInfo, BookEntry, OrderCheckResult, OrderSendResult, Rate, SymbolInfo, TerminalInfo,
    TerminalVersion, Tick, TradeDeal, TradeOrder, TradePosition, TradeRequest,
};

use crate::record::{Record, Value};

/// Field-by-field conversion of a native struct into a [`Record`].
pub trait ToRecord {
    fn to_record(&self) -> Record;
}

/// Convert a sequence of native structs. Empty input yields an empty vector.
pub fn to_records<T: ToRecord>(items: &[T]) -> Vec<Record> {
    items.iter().map(ToRecord::to_record).collect()
}

/// `time` or `time_*` fields hold epoch timestamps.
pub fn is_time_field(name: &str) -> bool {
    name == "time" || name.starts_with("time_")
}

fn is_millisecond_field(name: &str) -> bool {
    name.starts_with("time_") && name.ends_with("_msc")
}

/// Timestamp for a numeric epoch value in the unit implied by `name`.
/// Non-numeric values and out-of-range epochs yield `None`; a non-finite
/// float has no instant and becomes [`Value::Null`].
pub(crate) fn convert_time_value(name: &str, value: &Value) -> Option<Value> {
    if matches!(value, Value::Float(v) if !v.is_finite()) {
        return Some(Value::Null);
    }
    let millis = match (value, is_millisecond_field(name)) {
        (Value::Int(v), true) => *v,
        (Value::Int(v), false) => v.checked_mul(1000)?,
        (Value::Float(v), true) => v.round() as i64,
        (Value::Float(v), false) => (v * 1000.0).round() as i64,
        _ => return None,
    };
    DateTime::<Utc>::from_timestamp_millis(millis).map(Value::Time)
}

/// Convert every numeric time field of `record` to a timestamp.
///
/// Values that are already timestamps (or otherwise non-numeric) are left as
/// they are, so applying this twice is the same as applying it once.
pub fn convert_time_fields(mut record: Record) -> Record {
    for (name, value) in record.iter_mut() {
        if !is_time_field(name) {
            continue;
        }
        if let Some(converted) = convert_time_value(name, value) {
            *value = converted;
        }
    }
    record
}

macro_rules! impl_to_record {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl ToRecord for $ty {
            fn to_record(&self) -> Record {
                Record::new()
                    $(.with(stringify!($field).trim_start_matches("r#"), self.$field.clone()))*
            }
        }
    };
}

impl ToRecord for TerminalVersion {
    fn to_record(&self) -> Record {
        Record::new()
            .with("mt5_terminal_version", self.version)
            .with("build", self.build)
            .with("build_release_date", self.release_date.clone())
    }
}

impl_to_record!(AccountInfo {
    login,
    trade_mode,
    leverage,
    limit_orders,
    margin_so_mode,
    trade_allowed,
    trade_expert,
    margin_mode,
    currency_digits,
    fifo_close,
    balance,
    credit,
    profit,
    equity,
    margin,
    margin_free,
    margin_level,
    margin_so_call,
    margin_so_so,
    margin_initial,
    margin_maintenance,
    assets,
    liabilities,
    commission_blocked,
    name,
    server,
    currency,
    company,
});

impl_to_record!(TerminalInfo {
    community_account,
    community_connection,
    connected,
    dlls_allowed,
    trade_allowed,
    tradeapi_disabled,
    email_enabled,
    ftp_enabled,
    notifications_enabled,
    mqid,
    build,
    maxbars,
    codepage,
    ping_last,
    community_balance,
    retransmission,
    company,
    name,
    language,
    path,
    data_path,
    commondata_path,
});

impl_to_record!(SymbolInfo {
    name,
    description,
    path,
    currency_base,
    currency_profit,
    currency_margin,
    visible,
    select,
    custom,
    digits,
    spread,
    spread_float,
    trade_mode,
    trade_calc_mode,
    trade_exemode,
    filling_mode,
    expiration_mode,
    order_mode,
    time,
    bid,
    bidhigh,
    bidlow,
    ask,
    askhigh,
    asklow,
    last,
    point,
    trade_tick_value,
    trade_tick_size,
    trade_contract_size,
    volume_min,
    volume_max,
    volume_step,
    swap_long,
    swap_short,
    margin_initial,
    margin_maintenance,
});

impl_to_record!(Tick {
    time,
    bid,
    ask,
    last,
    volume,
    time_msc,
    flags,
    volume_real,
});

impl_to_record!(Rate {
    time,
    open,
    high,
    low,
    close,
    tick_volume,
    spread,
    real_volume,
});

impl_to_record!(BookEntry {
    r#type,
    price,
    volume,
    volume_dbl
});

impl_to_record!(TradeOrder {
    ticket,
    time_setup,
    time_setup_msc,
    time_done,
    time_done_msc,
    time_expiration,
    r#type,
    type_time,
    type_filling,
    state,
    magic,
    position_id,
    position_by_id,
    reason,
    volume_initial,
    volume_current,
    price_open,
    sl,
    tp,
    price_current,
    price_stoplimit,
    symbol,
    comment,
    external_id,
});

impl_to_record!(TradePosition {
    ticket,
    time,
    time_msc,
    time_update,
    time_update_msc,
    r#type,
    magic,
    identifier,
    reason,
    volume,
    price_open,
    sl,
    tp,
    price_current,
    swap,
    profit,
    symbol,
    comment,
    external_id,
});

impl_to_record!(TradeDeal {
    ticket,
    order,
    time,
    time_msc,
    r#type,
    entry,
    magic,
    position_id,
    reason,
    volume,
    price,
    commission,
    swap,
    profit,
    fee,
    symbol,
    comment,
    external_id,
});

/// Unset optional fields are omitted.
impl ToRecord for TradeRequest {
    fn to_record(&self) -> Record {
        let mut record = Record::new()
            .with("action", self.action)
            .with("symbol", self.symbol.clone())
            .with("volume", self.volume)
            .with("type", self.r#type);
        let optional: [(&str, Option<Value>); 13] = [
            ("magic", self.magic.map(Value::from)),
            ("order", self.order.map(Value::from)),
            ("price", self.price.map(Value::from)),
            ("stoplimit", self.stoplimit.map(Value::from)),
            ("sl", self.sl.map(Value::from)),
            ("tp", self.tp.map(Value::from)),
            ("deviation", self.deviation.map(Value::from)),
            ("type_filling", self.type_filling.map(Value::from)),
            ("type_time", self.type_time.map(Value::from)),
            ("expiration", self.expiration.map(Value::from)),
            ("comment", self.comment.clone().map(Value::from)),
            ("position", self.position.map(Value::from)),
            ("position_by", self.position_by.map(Value::from)),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                record.set(name, value);
            }
        }
        record
    }
}

/// The echoed request is flattened into `request_*` fields.
impl ToRecord for OrderSendResult {
    fn to_record(&self) -> Record {
        let mut record = Record::new()
            .with("retcode", self.retcode)
            .with("deal", self.deal)
            .with("order", self.order)
            .with("volume", self.volume)
            .with("price", self.price)
            .with("bid", self.bid)
            .with("ask", self.ask)
            .with("comment", self.comment.clone())
            .with("request_id", self.request_id)
            .with("retcode_external", self.retcode_external);
        record.extend_prefixed("request", self.request.to_record());
        record
    }
}

impl ToRecord for OrderCheckResult {
    fn to_record(&self) -> Record {
        let mut record = Record::new()
            .with("retcode", self.retcode)
            .with("balance", self.balance)
            .with("equity", self.equity)
            .with("profit", self.profit)
            .with("margin", self.margin)
            .with("margin_free", self.margin_free)
            .with("margin_level", self.margin_level)
            .with("comment", self.comment.clone());
        record.extend_prefixed("request", self.request.to_record());
        record
    }
}
