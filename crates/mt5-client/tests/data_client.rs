//! DataClient against the in-memory terminal.

use chrono::{TimeZone, Utc};
use std::sync::{Arc, Mutex};

use mt5_client::{Connectable, Connected, DataClient, HistoryQuery, Mt5Config};
use mt5_core::testing::FakeTerminal;
use mt5_core::{
    retcode, BookEntry, CopyTicks, HistoryFilter, Mt5Error, OpenFilter, OrderType, Rate,
    SymbolInfo, Tick, Timeframe, TradeAction, TradeDeal, TradeOrder, TradePosition, TradeRequest,
    ValidationError,
};
use mt5_frame::{FrameOptions, Value};

fn client(fake: &FakeTerminal) -> DataClient<FakeTerminal> {
    let inner = fake.clone();
    DataClient::new(move || inner.clone(), &Mt5Config::default()).with_sleep(|_| {})
}

fn open_client(fake: &FakeTerminal) -> DataClient<FakeTerminal> {
    let mut client = client(fake);
    client.open_with_retry().unwrap();
    client
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_configured_retry_count_bounds_attempts() {
    let fake = FakeTerminal::new();
    fake.fail("initialize");
    let sleeps = Arc::new(Mutex::new(Vec::new()));
    let recorded = sleeps.clone();
    let config = Mt5Config::from_toml("retry_count = 2").unwrap();
    let inner = fake.clone();
    let mut client = DataClient::new(move || inner.clone(), &config)
        .with_sleep(move |d| recorded.lock().unwrap().push(d.as_secs()));

    let err = client.open_with_retry().unwrap_err();

    assert!(matches!(err, Mt5Error::Binding(_)));
    assert_eq!(fake.call_count("initialize"), 3);
    assert_eq!(*sleeps.lock().unwrap(), vec![1, 2]);
}

#[test]
fn test_connected_guard_over_data_client() {
    let fake = FakeTerminal::new();
    let mut client = client(&fake);
    {
        let guard = Connected::acquire(&mut client).unwrap();
        assert!(guard.account_info_record(&FrameOptions::default()).is_ok());
    }
    assert_eq!(fake.call_count("shutdown"), 1);
    client.disconnect();
    assert_eq!(fake.call_count("shutdown"), 1);
}

#[test]
fn test_connection_config_reaches_terminal() {
    let fake = FakeTerminal::new();
    let config = Mt5Config::from_toml(
        r#"
        [connection]
        login = 7
        server = "Demo"
        "#,
    )
    .unwrap();
    let inner = fake.clone();
    let mut client = DataClient::new(move || inner.clone(), &config);
    client.connect().unwrap();

    let seen = fake.connect_configs();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].login, Some(7));
    assert_eq!(seen[0].server.as_deref(), Some("Demo"));
}

// ============================================================================
// Records and tables
// ============================================================================

#[test]
fn test_version_and_last_error_field_names() {
    let fake = FakeTerminal::new();
    let client = open_client(&fake);

    let version = client.version_record().unwrap();
    assert_eq!(
        version.names().collect::<Vec<_>>(),
        ["mt5_terminal_version", "build", "build_release_date"]
    );

    fake.set_last_error(-2, "Invalid params");
    let last = client.last_error_record();
    assert_eq!(last.get("error_code"), Some(&Value::Int(-2)));
    assert_eq!(
        last.get("error_description"),
        Some(&Value::Text("Invalid params".to_string()))
    );
}

#[test]
fn test_empty_listing_is_empty_table() {
    let fake = FakeTerminal::new();
    let client = open_client(&fake);

    let table = client
        .positions_table(
            &OpenFilter::symbol("EURUSD"),
            &FrameOptions::default().with_key(&["ticket"]),
        )
        .unwrap();

    assert!(table.is_empty());
    assert!(table.columns().is_empty());
}

#[test]
fn test_failed_listing_is_binding_error() {
    let fake = FakeTerminal::new();
    fake.fail("positions_get");
    let client = open_client(&fake);

    let err = client
        .positions_table(&OpenFilter::default(), &FrameOptions::default())
        .unwrap_err();
    assert_eq!(err.record().unwrap().operation, "positions_get");
}

#[test]
fn test_positions_keyed_by_ticket() {
    let fake = FakeTerminal::new();
    for ticket in [11, 12] {
        fake.add_position(TradePosition {
            ticket,
            symbol: "EURUSD".to_string(),
            time: 1_700_000_000,
            volume: 0.1,
            ..TradePosition::default()
        });
    }
    let client = open_client(&fake);

    let table = client
        .positions_table(
            &OpenFilter::symbol("EURUSD"),
            &FrameOptions::default().with_key(&["ticket"]),
        )
        .unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(table.key(), ["ticket"]);
    let row = table.find(&[Value::Int(12)]).unwrap();
    assert!(row.get("time").and_then(Value::as_time).is_some());
}

#[test]
fn test_raw_options_keep_epochs() {
    let fake = FakeTerminal::new();
    fake.add_symbol(SymbolInfo {
        name: "EURUSD".to_string(),
        time: 1_700_000_000,
        ..SymbolInfo::default()
    });
    let client = open_client(&fake);

    let record = client
        .symbol_info_record("EURUSD", &FrameOptions::raw())
        .unwrap();
    assert_eq!(record.get("time"), Some(&Value::Int(1_700_000_000)));
}

#[test]
fn test_symbols_table_group_filter() {
    let fake = FakeTerminal::new();
    for name in ["EURUSD", "USDJPY", "EURJPY"] {
        fake.add_symbol(SymbolInfo {
            name: name.to_string(),
            ..SymbolInfo::default()
        });
    }
    let client = open_client(&fake);

    let table = client
        .symbols_table(Some("*JPY*"), &FrameOptions::default())
        .unwrap();
    let names: Vec<_> = table
        .column("name")
        .unwrap()
        .into_iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(names, ["USDJPY", "EURJPY"]);
}

// ============================================================================
// Validation happens before the binding
// ============================================================================

#[test]
fn test_non_positive_count_never_reaches_binding() {
    let fake = FakeTerminal::new();
    let client = open_client(&fake);
    let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let err = client
        .rates_from_table("EURUSD", Timeframe::M1, from, 0, &FrameOptions::default())
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid count: 0. Count must be positive.");

    let err = client
        .ticks_from_table("EURUSD", from, -5, CopyTicks::All, &FrameOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        Mt5Error::Validation(ValidationError::NonPositiveCount(-5))
    ));

    assert_eq!(fake.call_count("copy_rates_from"), 0);
    assert_eq!(fake.call_count("copy_ticks_from"), 0);
}

#[test]
fn test_negative_start_pos_rejected() {
    let fake = FakeTerminal::new();
    let client = open_client(&fake);

    let err = client
        .rates_from_pos_records("EURUSD", Timeframe::H1, -1, 10, &FrameOptions::default())
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid start_pos: -1. Position must be non-negative."
    );
}

#[test]
fn test_reversed_range_rejected() {
    let fake = FakeTerminal::new();
    let client = open_client(&fake);
    let from = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    let to = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    assert!(client
        .ticks_range_table("EURUSD", from, to, CopyTicks::All, &FrameOptions::default())
        .is_err());
    assert!(client
        .rates_range_table("EURUSD", Timeframe::D1, from, to, &FrameOptions::default())
        .is_err());
    assert_eq!(fake.call_count("copy_ticks_range"), 0);
    assert_eq!(fake.call_count("copy_rates_range"), 0);
}

#[test]
fn test_calc_inputs_validated() {
    let fake = FakeTerminal::new();
    fake.set_margin_per_lot("EURUSD", 100.0);
    let client = open_client(&fake);

    assert_eq!(
        client
            .order_calc_margin(OrderType::Buy, "EURUSD", 0.0, 1.1)
            .unwrap_err()
            .to_string(),
        "Invalid volume: 0. Volume must be positive."
    );
    assert_eq!(
        client
            .order_calc_profit(OrderType::Buy, "EURUSD", 1.0, 0.0, 1.2)
            .unwrap_err()
            .to_string(),
        "Invalid price_open: 0. Price must be positive."
    );
    assert_eq!(fake.call_count("order_calc_margin"), 0);

    let margin = client
        .order_calc_margin(OrderType::Buy, "EURUSD", 0.5, 1.1)
        .unwrap();
    assert!((margin - 50.0).abs() < 1e-9);
}

// ============================================================================
// History
// ============================================================================

#[test]
fn test_history_ticket_beats_position() {
    let fake = FakeTerminal::new();
    fake.set_history_deals(vec![
        TradeDeal {
            ticket: 1,
            position_id: 5,
            ..TradeDeal::default()
        },
        TradeDeal {
            ticket: 2,
            position_id: 5,
            ..TradeDeal::default()
        },
    ]);
    let client = open_client(&fake);

    let query = HistoryQuery {
        ticket: Some(1),
        position: Some(5),
        ..HistoryQuery::default()
    };
    let table = client
        .history_deals_table(&query, &FrameOptions::default())
        .unwrap();

    assert_eq!(table.len(), 1);
    assert_eq!(fake.history_filters(), vec![HistoryFilter::Ticket(1)]);
}

#[test]
fn test_history_without_dates_never_reaches_binding() {
    let fake = FakeTerminal::new();
    let client = open_client(&fake);

    let err = client
        .history_orders_table(&HistoryQuery::default(), &FrameOptions::default())
        .unwrap_err();

    assert!(matches!(
        err,
        Mt5Error::Validation(ValidationError::MissingDateRange)
    ));
    assert_eq!(fake.call_count("history_orders_get"), 0);
}

#[test]
fn test_history_symbol_becomes_group() {
    let fake = FakeTerminal::new();
    let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let to = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    fake.set_history_deals(vec![
        TradeDeal {
            ticket: 1,
            symbol: "EURUSD".to_string(),
            time: from.timestamp() + 60,
            ..TradeDeal::default()
        },
        TradeDeal {
            ticket: 2,
            symbol: "USDJPY".to_string(),
            time: from.timestamp() + 60,
            ..TradeDeal::default()
        },
    ]);
    let client = open_client(&fake);

    let records = client
        .history_deals_records(
            &HistoryQuery::range(from, to).with_symbol("EUR"),
            &FrameOptions::default(),
        )
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("ticket"), Some(&Value::Int(1)));
    assert_eq!(
        fake.history_filters(),
        vec![HistoryFilter::Range {
            from,
            to,
            group: Some("*EUR*".to_string()),
        }]
    );
}

// ============================================================================
// Market data
// ============================================================================

#[test]
fn test_rates_and_ticks_tables() {
    let fake = FakeTerminal::new();
    fake.set_rates(
        (0..5)
            .map(|i| Rate {
                time: 1_700_000_000 + i * 60,
                close: 1.0 + i as f64 / 100.0,
                ..Rate::default()
            })
            .collect(),
    );
    fake.set_tick_series(vec![Tick {
        time: 1_700_000_000,
        time_msc: 1_700_000_000_500,
        bid: 1.1,
        ask: 1.2,
        ..Tick::default()
    }]);
    let client = open_client(&fake);
    let from = Utc.with_ymd_and_hms(2023, 11, 14, 0, 0, 0).unwrap();

    let rates = client
        .rates_from_pos_table(
            "EURUSD",
            Timeframe::M1,
            1,
            3,
            &FrameOptions::default().with_key(&["time"]),
        )
        .unwrap();
    assert_eq!(rates.len(), 3);
    assert_eq!(
        rates.value(0, "time").and_then(Value::as_time).unwrap().timestamp(),
        1_700_000_060
    );

    let ticks = client
        .ticks_from_table("EURUSD", from, 10, CopyTicks::All, &FrameOptions::default())
        .unwrap();
    assert_eq!(
        ticks
            .value(0, "time_msc")
            .and_then(Value::as_time)
            .unwrap()
            .timestamp_millis(),
        1_700_000_000_500
    );
}

#[test]
fn test_market_book_table() {
    let fake = FakeTerminal::new();
    fake.set_book(vec![
        BookEntry {
            r#type: 1,
            price: 1.1002,
            volume: 5,
            volume_dbl: 5.0,
        },
        BookEntry {
            r#type: 2,
            price: 1.0998,
            volume: 3,
            volume_dbl: 3.0,
        },
    ]);
    let client = open_client(&fake);

    client.client().market_book_add("EURUSD").unwrap();
    let book = client
        .market_book_table("EURUSD", &FrameOptions::default())
        .unwrap();
    let records = client
        .market_book_records("EURUSD", &FrameOptions::default())
        .unwrap();
    client.client().market_book_release("EURUSD").unwrap();

    assert_eq!(book.columns(), ["type", "price", "volume", "volume_dbl"]);
    assert_eq!(book.len(), 2);
    assert_eq!(book.value(1, "price"), Some(&Value::Float(1.0998)));
    assert_eq!(records[0].get("type"), Some(&Value::Int(1)));
    assert_eq!(fake.call_count("market_book_add"), 1);
    assert_eq!(fake.call_count("market_book_release"), 1);
}

#[test]
fn test_failed_book_subscription_is_binding_error() {
    let fake = FakeTerminal::new();
    fake.fail("market_book_add");
    let client = open_client(&fake);

    let err = client.client().market_book_add("EURUSD").unwrap_err();
    assert!(matches!(err, Mt5Error::Binding(_)));
}

// ============================================================================
// Orders
// ============================================================================

fn order(ticket: i64, symbol: &str, time_setup: i64) -> TradeOrder {
    TradeOrder {
        ticket,
        symbol: symbol.to_string(),
        time_setup,
        time_setup_msc: time_setup * 1000 + 250,
        volume_initial: 0.1,
        ..TradeOrder::default()
    }
}

#[test]
fn test_open_orders_table_keyed_and_converted() {
    let fake = FakeTerminal::new();
    fake.add_order(order(11, "EURUSD", 1_700_000_000));
    fake.add_order(order(12, "EURUSD", 1_700_000_060));
    fake.add_order(order(13, "USDJPY", 1_700_000_120));
    let client = open_client(&fake);

    let orders = client
        .orders_table(
            &OpenFilter::symbol("EURUSD"),
            &FrameOptions::default().with_key(&["ticket"]),
        )
        .unwrap();

    assert_eq!(orders.len(), 2);
    assert_eq!(orders.key(), ["ticket"]);
    let row = orders.find(&[Value::Int(12)]).unwrap();
    let setup = row.get("time_setup").and_then(Value::as_time).unwrap();
    assert_eq!(setup.timestamp(), 1_700_000_060);
    let setup_msc = row.get("time_setup_msc").and_then(Value::as_time).unwrap();
    assert_eq!(setup_msc.timestamp_millis(), 1_700_000_060_250);
    assert_eq!(fake.open_filters(), vec![OpenFilter::symbol("EURUSD")]);
}

#[test]
fn test_open_orders_records_by_ticket() {
    let fake = FakeTerminal::new();
    fake.add_order(order(11, "EURUSD", 1_700_000_000));
    fake.add_order(order(12, "EURUSD", 1_700_000_060));
    let client = open_client(&fake);

    let records = client
        .orders_records(&OpenFilter::ticket(11), &FrameOptions::raw())
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("time_setup"), Some(&Value::Int(1_700_000_000)));
}

#[test]
fn test_history_orders_table_in_range() {
    let fake = FakeTerminal::new();
    let inside = Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap().timestamp();
    let outside = Utc.with_ymd_and_hms(2024, 6, 2, 9, 0, 0).unwrap().timestamp();
    fake.set_history_orders(vec![
        order(21, "EURUSD", inside),
        order(22, "USDJPY", inside),
        order(23, "EURUSD", outside),
    ]);
    let client = open_client(&fake);

    let query = HistoryQuery::range(
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
    )
    .with_symbol("EURUSD");
    let orders = client
        .history_orders_table(&query, &FrameOptions::default().with_key(&["ticket"]))
        .unwrap();

    assert_eq!(orders.len(), 1);
    assert_eq!(orders.key(), ["ticket"]);
    let row = orders.find(&[Value::Int(21)]).unwrap();
    assert_eq!(
        row.get("time_setup").and_then(Value::as_time).unwrap().timestamp(),
        inside
    );
}

#[test]
fn test_history_orders_by_position() {
    let fake = FakeTerminal::new();
    let mut linked = order(31, "EURUSD", 1_700_000_000);
    linked.position_id = 900;
    fake.set_history_orders(vec![linked, order(32, "EURUSD", 1_700_000_000)]);
    let client = open_client(&fake);

    let records = client
        .history_orders_records(&HistoryQuery::position(900), &FrameOptions::default())
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("ticket"), Some(&Value::Int(31)));
}

// ============================================================================
// Order check and calculations
// ============================================================================

#[test]
fn test_order_check_records_scripted_retcodes() {
    let fake = FakeTerminal::new();
    fake.script_check_retcodes([retcode::CHECK_OK, retcode::NO_MONEY]);
    let client = open_client(&fake);
    let request = TradeRequest::new(TradeAction::Deal, "EURUSD", 0.1, OrderType::Buy);

    let accepted = client.order_check_record(&request).unwrap();
    let rejected = client.order_check_table(&request).unwrap();

    assert_eq!(accepted.get("retcode"), Some(&Value::Int(0)));
    assert_eq!(accepted.get("comment"), Some(&Value::from("Done")));
    assert_eq!(accepted.get("request_symbol"), Some(&Value::from("EURUSD")));
    assert_eq!(
        rejected.value(0, "retcode"),
        Some(&Value::Int(i64::from(retcode::NO_MONEY)))
    );
    assert_eq!(fake.checked_requests(), vec![request.clone(), request]);
    assert!(fake.sent_requests().is_empty());
}

#[test]
fn test_order_calc_profit_passthrough() {
    let fake = FakeTerminal::new();
    fake.set_profit(12.5);
    let client = open_client(&fake);

    let profit = client
        .order_calc_profit(OrderType::Buy, "EURUSD", 0.1, 1.1, 1.2)
        .unwrap();

    assert_eq!(profit, 12.5);
    assert_eq!(fake.call_count("order_calc_profit"), 1);
}
