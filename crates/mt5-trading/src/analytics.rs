//! Performance and risk statistics over historical deals.
//!
//! Everything here is pure: inputs are deal rows extracted from a deals
//! table, outputs are plain structs that serialize to JSON.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use mt5_core::{Mt5Result, ValidationError};
use mt5_frame::{Record, Table, Value};

/// Trading days per year used to annualize the Sharpe ratio.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// The two fields analytics needs from a deal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DealRow {
    pub time: DateTime<Utc>,
    pub profit: f64,
}

fn row_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Time(t) => Some(*t),
        Value::Int(epoch) => DateTime::from_timestamp(*epoch, 0),
        _ => None,
    }
}

/// Extract `(time, profit)` rows from a deals table.
///
/// `time` may be a converted timestamp or a second epoch. Rows without a
/// usable time or profit are skipped.
pub fn deal_rows(deals: &Table) -> Mt5Result<Vec<DealRow>> {
    if deals.is_empty() {
        return Ok(Vec::new());
    }
    for column in ["time", "profit"] {
        if deals.column_index(column).is_none() {
            return Err(ValidationError::MissingColumn(column.to_string()).into());
        }
    }
    Ok(deals
        .records()
        .iter()
        .filter_map(|deal| {
            Some(DealRow {
                time: deal.get("time").and_then(row_time)?,
                profit: deal.get("profit").and_then(Value::as_f64)?,
            })
        })
        .collect())
}

// ============================================================================
// Summary
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TradingSummary {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub total_profit: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    /// Percentage of winning deals.
    pub win_rate: f64,
    /// `gross_profit / |gross_loss|`; infinite without losing deals.
    pub profit_factor: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub average_win: f64,
    pub average_loss: f64,
}

pub fn trading_summary(deals: &[DealRow]) -> TradingSummary {
    let wins: Vec<f64> = deals.iter().map(|d| d.profit).filter(|p| *p > 0.0).collect();
    let losses: Vec<f64> = deals.iter().map(|d| d.profit).filter(|p| *p < 0.0).collect();

    let gross_profit: f64 = wins.iter().sum();
    let gross_loss: f64 = losses.iter().sum();
    let total = deals.len();

    let win_rate = if total == 0 {
        0.0
    } else {
        wins.len() as f64 / total as f64 * 100.0
    };
    let profit_factor = if losses.is_empty() {
        f64::INFINITY
    } else {
        gross_profit / gross_loss.abs()
    };

    TradingSummary {
        total_trades: total,
        winning_trades: wins.len(),
        losing_trades: losses.len(),
        total_profit: deals.iter().map(|d| d.profit).sum(),
        gross_profit,
        gross_loss,
        win_rate,
        profit_factor,
        largest_win: wins.iter().copied().fold(0.0, f64::max),
        largest_loss: losses.iter().copied().fold(0.0, f64::min),
        average_win: mean(&wins).unwrap_or(0.0),
        average_loss: mean(&losses).unwrap_or(0.0),
    }
}

// ============================================================================
// Daily P&L
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPnl {
    pub date: NaiveDate,
    pub profit: f64,
    pub trades: usize,
    pub cumulative_profit: f64,
}

/// Profit per UTC calendar date, ascending, with a running total.
pub fn daily_pnl(deals: &[DealRow]) -> Vec<DailyPnl> {
    let mut by_date: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for deal in deals {
        let entry = by_date.entry(deal.time.date_naive()).or_default();
        entry.0 += deal.profit;
        entry.1 += 1;
    }

    let mut cumulative = 0.0;
    by_date
        .into_iter()
        .map(|(date, (profit, trades))| {
            cumulative += profit;
            DailyPnl {
                date,
                profit,
                trades,
                cumulative_profit: cumulative,
            }
        })
        .collect()
}

/// Table form of [`daily_pnl`], keyed by `date` (`YYYY-MM-DD`).
pub fn daily_pnl_table(daily: &[DailyPnl]) -> Mt5Result<Table> {
    let records = daily
        .iter()
        .map(|day| {
            Record::new()
                .with("date", day.date.format("%Y-%m-%d").to_string())
                .with("profit", day.profit)
                .with("trades", day.trades)
                .with("cumulative_profit", day.cumulative_profit)
        })
        .collect();
    Table::build(records, Some(&["date"][..]))
}

// ============================================================================
// Drawdown
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Drawdown {
    /// Most negative distance below the running peak.
    pub max_drawdown: f64,
    /// Distance below the peak at the last deal.
    pub current_drawdown: f64,
    /// `max_drawdown` relative to the highest cumulative profit, in percent.
    /// Zero when that peak is not positive.
    pub max_drawdown_percentage: f64,
}

/// Cumulative series minus its running maximum.
pub fn drawdown_series(cumulative: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    cumulative
        .iter()
        .map(|&value| {
            peak = peak.max(value);
            value - peak
        })
        .collect()
}

/// Drawdown of cumulative profit with deals taken in time order.
pub fn drawdown(deals: &[DealRow]) -> Drawdown {
    let mut ordered = deals.to_vec();
    ordered.sort_by_key(|d| d.time);

    let cumulative: Vec<f64> = ordered
        .iter()
        .scan(0.0, |total, deal| {
            *total += deal.profit;
            Some(*total)
        })
        .collect();
    let series = drawdown_series(&cumulative);

    let max_drawdown = series.iter().copied().fold(0.0, f64::min);
    let peak = cumulative.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let max_drawdown_percentage = if peak > 0.0 {
        max_drawdown / peak * 100.0
    } else {
        0.0
    };

    Drawdown {
        max_drawdown,
        current_drawdown: series.last().copied().unwrap_or(0.0),
        max_drawdown_percentage,
    }
}

// ============================================================================
// Risk
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RiskMetrics {
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Sample standard deviation of daily profit.
    pub volatility: f64,
    pub mean_daily_profit: f64,
    pub best_day: f64,
    pub worst_day: f64,
    pub annualized_sharpe: f64,
    pub trading_days: usize,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation; undefined below two values.
fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

fn ratio(numerator: f64, denominator: Option<f64>) -> f64 {
    match denominator {
        Some(d) if d > 0.0 => numerator / d,
        _ => 0.0,
    }
}

pub fn risk_metrics(daily: &[DailyPnl]) -> RiskMetrics {
    let profits: Vec<f64> = daily.iter().map(|d| d.profit).collect();
    if profits.is_empty() {
        return RiskMetrics::default();
    }

    let mean_daily = mean(&profits).unwrap_or(0.0);
    let std_dev = sample_std_dev(&profits);
    let negatives: Vec<f64> = profits.iter().copied().filter(|p| *p < 0.0).collect();

    let sharpe = ratio(mean_daily, std_dev);
    RiskMetrics {
        sharpe_ratio: sharpe,
        sortino_ratio: ratio(mean_daily, sample_std_dev(&negatives)),
        volatility: std_dev.unwrap_or(0.0),
        mean_daily_profit: mean_daily,
        best_day: profits.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        worst_day: profits.iter().copied().fold(f64::INFINITY, f64::min),
        annualized_sharpe: sharpe * TRADING_DAYS_PER_YEAR.sqrt(),
        trading_days: profits.len(),
    }
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub summary: TradingSummary,
    pub daily: Vec<DailyPnl>,
    pub drawdown: Drawdown,
    pub risk: RiskMetrics,
}

impl PerformanceReport {
    pub fn from_deals(deals: &[DealRow]) -> Self {
        let daily = daily_pnl(deals);
        Self {
            summary: trading_summary(deals),
            drawdown: drawdown(deals),
            risk: risk_metrics(&daily),
            daily,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn rows(profits: &[f64]) -> Vec<DealRow> {
        profits
            .iter()
            .enumerate()
            .map(|(i, &profit)| DealRow {
                time: at(1, 0) + Duration::hours(i as i64),
                profit,
            })
            .collect()
    }

    // ========================================================================
    // Extraction
    // ========================================================================

    #[test]
    fn test_deal_rows_accept_epoch_and_timestamp() {
        let table = Table::from_records(vec![
            Record::new().with("time", 1_709_251_200i64).with("profit", 5.0),
            Record::new().with("time", at(2, 0)).with("profit", -2.0),
            Record::new().with("time", Value::Null).with("profit", 1.0),
        ]);
        let deals = deal_rows(&table).unwrap();
        assert_eq!(deals.len(), 2);
        assert_eq!(deals[0].time, at(1, 0));
        assert_eq!(deals[1].profit, -2.0);
    }

    #[test]
    fn test_deal_rows_missing_column() {
        let table = Table::from_records(vec![Record::new().with("time", 0i64)]);
        let err = deal_rows(&table).unwrap_err();
        assert_eq!(err.to_string(), "Column `profit` is required but missing");
    }

    #[test]
    fn test_deal_rows_empty_table() {
        assert!(deal_rows(&Table::empty()).unwrap().is_empty());
    }

    // ========================================================================
    // Summary
    // ========================================================================

    #[test]
    fn test_summary_counts_and_ratios() {
        let summary = trading_summary(&rows(&[10.0, -4.0, 6.0, 0.0, -1.0]));
        assert_eq!(summary.total_trades, 5);
        assert_eq!(summary.winning_trades, 2);
        assert_eq!(summary.losing_trades, 2);
        assert_eq!(summary.total_profit, 11.0);
        assert_eq!(summary.gross_profit, 16.0);
        assert_eq!(summary.gross_loss, -5.0);
        assert_eq!(summary.win_rate, 40.0);
        assert!((summary.profit_factor - 3.2).abs() < 1e-12);
        assert_eq!(summary.largest_win, 10.0);
        assert_eq!(summary.largest_loss, -4.0);
        assert_eq!(summary.average_win, 8.0);
        assert_eq!(summary.average_loss, -2.5);
    }

    #[test]
    fn test_summary_without_losses() {
        let summary = trading_summary(&rows(&[1.0, 2.0]));
        assert!(summary.profit_factor.is_infinite());
        assert_eq!(summary.average_loss, 0.0);
    }

    #[test]
    fn test_summary_without_deals() {
        let summary = trading_summary(&[]);
        assert_eq!(summary.win_rate, 0.0);
        assert_eq!(summary.total_trades, 0);
    }

    // ========================================================================
    // Daily / drawdown
    // ========================================================================

    #[test]
    fn test_daily_pnl_groups_by_date() {
        let deals = vec![
            DealRow {
                time: at(2, 9),
                profit: -3.0,
            },
            DealRow {
                time: at(1, 10),
                profit: 5.0,
            },
            DealRow {
                time: at(1, 23),
                profit: 1.0,
            },
        ];
        let daily = daily_pnl(&deals);

        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].date, at(1, 0).date_naive());
        assert_eq!(daily[0].profit, 6.0);
        assert_eq!(daily[0].trades, 2);
        assert_eq!(daily[1].cumulative_profit, 3.0);

        let table = daily_pnl_table(&daily).unwrap();
        assert_eq!(
            table.find(&[Value::Text("2024-03-02".to_string())]).unwrap().get("profit"),
            Some(&Value::Float(-3.0))
        );
    }

    #[test]
    fn test_drawdown_series_scenario() {
        assert_eq!(
            drawdown_series(&[10.0, 5.0, 15.0, 2.0]),
            vec![0.0, -5.0, 0.0, -13.0]
        );
    }

    #[test]
    fn test_drawdown_from_deals() {
        // cumulative 10, 5, 15, 2
        let dd = drawdown(&rows(&[10.0, -5.0, 10.0, -13.0]));
        assert_eq!(dd.max_drawdown, -13.0);
        assert_eq!(dd.current_drawdown, -13.0);
        assert!((dd.max_drawdown_percentage - (-13.0 / 15.0 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn test_drawdown_orders_by_time() {
        let mut deals = rows(&[10.0, -5.0]);
        deals.reverse();
        let dd = drawdown(&deals);
        assert_eq!(dd.max_drawdown, -5.0);
    }

    #[test]
    fn test_drawdown_never_positive_peak() {
        let dd = drawdown(&rows(&[-1.0, -2.0]));
        assert_eq!(dd.max_drawdown, -2.0);
        assert_eq!(dd.max_drawdown_percentage, 0.0);
    }

    // ========================================================================
    // Risk
    // ========================================================================

    fn days(profits: &[f64]) -> Vec<DailyPnl> {
        profits
            .iter()
            .enumerate()
            .map(|(i, &profit)| DailyPnl {
                date: (at(1, 0) + Duration::days(i as i64)).date_naive(),
                profit,
                trades: 1,
                cumulative_profit: 0.0,
            })
            .collect()
    }

    #[test]
    fn test_risk_metrics_sample_std_dev() {
        let risk = risk_metrics(&days(&[2.0, 4.0, 6.0]));
        // mean 4, sample std dev 2
        assert_eq!(risk.mean_daily_profit, 4.0);
        assert!((risk.volatility - 2.0).abs() < 1e-12);
        assert!((risk.sharpe_ratio - 2.0).abs() < 1e-12);
        assert_eq!(risk.sortino_ratio, 0.0);
        assert_eq!(risk.best_day, 6.0);
        assert_eq!(risk.worst_day, 2.0);
        assert_eq!(risk.trading_days, 3);
        assert!((risk.annualized_sharpe - 2.0 * 252f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_sortino_uses_negative_days() {
        let risk = risk_metrics(&days(&[5.0, -1.0, -3.0]));
        // negatives -1, -3: sample std dev sqrt(2)
        let expected = (1.0 / 3.0) / 2f64.sqrt();
        assert!((risk.sortino_ratio - expected).abs() < 1e-12);
    }

    #[test]
    fn test_constant_profits_have_zero_ratios() {
        let risk = risk_metrics(&days(&[1.0, 1.0, 1.0]));
        assert_eq!(risk.sharpe_ratio, 0.0);
        assert_eq!(risk.volatility, 0.0);
    }

    #[test]
    fn test_single_day_and_empty() {
        assert_eq!(risk_metrics(&days(&[3.0])).sharpe_ratio, 0.0);
        assert_eq!(risk_metrics(&[]), RiskMetrics::default());
    }

    #[test]
    fn test_report_serializes() {
        let report = PerformanceReport::from_deals(&rows(&[1.0, -1.0]));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["summary"]["total_trades"], 2);
        assert_eq!(json["daily"][0]["date"], "2024-03-01");
    }
}
