//! CSV export.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use mt5_frame::Table;
use tracing::info;

use crate::error::PersistenceResult;

/// Write `table` to a new CSV file at `path`, replacing any existing file.
///
/// Returns the number of data rows written.
pub fn write_csv(table: &Table, path: impl AsRef<Path>) -> PersistenceResult<usize> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let rows = write_csv_to(table, file)?;
    info!(path = %path.display(), rows, "Table exported to CSV");
    Ok(rows)
}

/// Write `table` as CSV into any writer.
///
/// The header row lists the columns in table order. Null cells are empty,
/// timestamps use RFC 3339 in UTC. A table without columns produces no output.
pub fn write_csv_to<W: Write>(table: &Table, writer: W) -> PersistenceResult<usize> {
    let mut csv_wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    if !table.columns().is_empty() {
        csv_wtr.write_record(table.columns())?;
    }
    for row in table.rows() {
        csv_wtr.write_record(row.iter().map(|value| value.to_string()))?;
    }
    csv_wtr.flush()?;
    Ok(table.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mt5_frame::{Record, Value};

    fn render(table: &Table) -> String {
        let mut buf = Vec::new();
        write_csv_to(table, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_header_follows_column_order() {
        let table = Table::from_records(vec![
            Record::new().with("ticket", 1i64).with("symbol", "EURUSD"),
            Record::new().with("ticket", 2i64).with("profit", 1.5),
        ]);

        assert_eq!(
            render(&table),
            "ticket,symbol,profit\n1,EURUSD,\n2,,1.5\n"
        );
    }

    #[test]
    fn test_time_cells_are_rfc3339() {
        let time = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let table = Table::from_columns(
            vec!["time".to_string(), "flag".to_string()],
            vec![vec![Value::Time(time), Value::Bool(true)]],
        )
        .unwrap();

        assert_eq!(render(&table), "time,flag\n2024-05-01T12:30:00Z,true\n");
    }

    #[test]
    fn test_text_with_separator_is_quoted() {
        let table = Table::from_records(vec![Record::new().with("comment", "a,b")]);
        assert_eq!(render(&table), "comment\n\"a,b\"\n");
    }

    #[test]
    fn test_empty_table_writes_nothing() {
        assert_eq!(render(&Table::empty()), "");
    }

    #[test]
    fn test_write_csv_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deals.csv");
        let table = Table::from_records(vec![
            Record::new().with("ticket", 1i64),
            Record::new().with("ticket", 2i64),
        ]);

        let rows = write_csv(&table, &path).unwrap();

        assert_eq!(rows, 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ticket\n1\n2\n");
    }
}
