//! SQLite export.

use std::path::Path;

use mt5_frame::{Table, Value};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use tracing::{debug, info};

use crate::error::{PersistenceError, PersistenceResult};

/// What to do when the target table already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IfExists {
    /// Refuse to write.
    Fail,
    /// Drop and recreate the table.
    Replace,
    /// Insert after the existing rows.
    #[default]
    Append,
}

/// ASCII identifier: a letter or underscore, then letters, digits or underscores.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_identifier(name: &str) -> PersistenceResult<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(PersistenceError::InvalidIdentifier(name.to_string()))
    }
}

fn quote(name: &str) -> String {
    format!("\"{name}\"")
}

/// Storage class of a column, taken from its first non-null cell.
fn column_type(table: &Table, index: usize) -> &'static str {
    let first = table
        .rows()
        .iter()
        .map(|row| &row[index])
        .find(|value| !value.is_null());
    match first {
        Some(Value::Int(_)) | Some(Value::Bool(_)) => "INTEGER",
        Some(Value::Float(_)) => "REAL",
        Some(Value::Text(_)) | Some(Value::Time(_)) => "TEXT",
        Some(Value::Null) | None => "",
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(v) => SqlValue::Integer(i64::from(*v)),
        Value::Int(v) => SqlValue::Integer(*v),
        Value::Float(v) => SqlValue::Real(*v),
        Value::Text(v) => SqlValue::Text(v.clone()),
        time @ Value::Time(_) => SqlValue::Text(time.to_string()),
    }
}

fn table_exists(conn: &Connection, name: &str) -> PersistenceResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Write `table` into the SQLite table `name`.
///
/// Table and column names must be identifiers. When the table has key
/// columns, rows duplicating an earlier row's key are deleted after the
/// insert, so the first occurrence wins across appends. Returns the number
/// of rows inserted.
pub fn write_sqlite(
    conn: &mut Connection,
    table: &Table,
    name: &str,
    if_exists: IfExists,
) -> PersistenceResult<usize> {
    check_identifier(name)?;
    for column in table.columns() {
        check_identifier(column)?;
    }

    if table.columns().is_empty() {
        debug!(table = name, "Nothing to export");
        return Ok(0);
    }

    let exists = table_exists(conn, name)?;
    let tx = conn.transaction()?;

    match if_exists {
        IfExists::Fail if exists => return Err(PersistenceError::TableExists(name.to_string())),
        IfExists::Replace if exists => {
            tx.execute(&format!("DROP TABLE {}", quote(name)), [])?;
        }
        _ => {}
    }

    let definitions: Vec<String> = table
        .columns()
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{} {}", quote(column), column_type(table, i)))
        .map(|definition| definition.trim_end().to_string())
        .collect();
    tx.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote(name),
            definitions.join(", ")
        ),
        [],
    )?;

    let columns: Vec<String> = table.columns().iter().map(|c| quote(c)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(name),
            columns.join(", "),
            placeholders.join(", ")
        ))?;
        for row in table.rows() {
            stmt.execute(params_from_iter(row.iter().map(to_sql)))?;
        }
    }

    let removed = if table.key().is_empty() {
        0
    } else {
        let key: Vec<String> = table.key().iter().map(|k| quote(k)).collect();
        tx.execute(
            &format!(
                "DELETE FROM {table} WHERE ROWID NOT IN \
                 (SELECT MIN(ROWID) FROM {table} GROUP BY {key})",
                table = quote(name),
                key = key.join(", ")
            ),
            [],
        )?
    };

    tx.commit()?;

    info!(
        table = name,
        rows = table.len(),
        duplicates_removed = removed,
        ?if_exists,
        "Table exported to SQLite"
    );
    Ok(table.len())
}

/// Open (or create) the database file at `path` and write `table` into it.
pub fn write_sqlite_file(
    path: impl AsRef<Path>,
    table: &Table,
    name: &str,
    if_exists: IfExists,
) -> PersistenceResult<usize> {
    let mut conn = Connection::open(path.as_ref())?;
    write_sqlite(&mut conn, table, name, if_exists)
}
