//! Column-ordered tables of records.

use serde::ser::{Serialize, SerializeSeq, Serializer};

use mt5_core::{Mt5Result, ValidationError};

use crate::normalize::{convert_time_value, is_time_field};
use crate::record::{Record, Value};

/// Rows sharing a uniform column set.
///
/// Columns appear in first-appearance order across the input records; a row
/// that lacks a column holds [`Value::Null`] there. The optional key names
/// the columns used by [`Table::find`]. Key uniqueness is not enforced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    key: Vec<String>,
}

impl Table {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Assemble rows from records without a key.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for name in record.names() {
                if !columns.iter().any(|c| c == name) {
                    columns.push(name.to_string());
                }
            }
        }
        let rows = records
            .into_iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| record.get(column).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Self {
            columns,
            rows,
            key: Vec::new(),
        }
    }

    /// Build a table and designate `key` as its lookup key.
    ///
    /// Empty input yields an empty table without looking at `key`.
    pub fn build(records: Vec<Record>, key: Option<&[&str]>) -> Mt5Result<Self> {
        let mut table = Self::from_records(records);
        if let Some(key) = key {
            let key: Vec<String> = key.iter().map(|k| k.to_string()).collect();
            table.set_key(&key)?;
        }
        Ok(table)
    }

    /// Table with explicit columns. Every row must hold one value per column.
    pub fn from_columns(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Mt5Result<Self> {
        if let Some((row, values)) = rows
            .iter()
            .enumerate()
            .find(|(_, values)| values.len() != columns.len())
        {
            return Err(ValidationError::RowLength {
                row,
                expected: columns.len(),
                found: values.len(),
            }
            .into());
        }
        Ok(Self {
            columns,
            rows,
            key: Vec::new(),
        })
    }

    /// Designate `key` as the lookup key. Every key column must be present
    /// with a non-null value in every row. No-op on an empty table.
    pub fn set_key(&mut self, key: &[String]) -> Mt5Result<()> {
        if self.rows.is_empty() {
            return Ok(());
        }
        for column in key {
            let index = self.column_index(column).ok_or_else(|| {
                ValidationError::MissingKeyColumn {
                    column: column.clone(),
                    row: 0,
                }
            })?;
            if let Some(row) = self.rows.iter().position(|row| row[index].is_null()) {
                return Err(ValidationError::MissingKeyColumn {
                    column: column.clone(),
                    row,
                }
                .into());
            }
        }
        self.key = key.to_vec();
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn key(&self) -> &[String] {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[index])
    }

    pub fn row(&self, index: usize) -> Option<Record> {
        self.rows.get(index).map(|row| self.to_record(row))
    }

    pub fn records(&self) -> Vec<Record> {
        self.rows.iter().map(|row| self.to_record(row)).collect()
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// First row whose key columns equal `key_values`.
    pub fn find(&self, key_values: &[Value]) -> Option<Record> {
        if self.key.is_empty() || key_values.len() != self.key.len() {
            return None;
        }
        let indices: Vec<usize> = self
            .key
            .iter()
            .filter_map(|k| self.column_index(k))
            .collect();
        self.rows
            .iter()
            .find(|row| indices.iter().zip(key_values).all(|(&i, v)| &row[i] == v))
            .map(|row| self.to_record(row))
    }

    /// Convert numeric values of every time column to timestamps.
    #[must_use]
    pub fn convert_time_fields(mut self) -> Self {
        for (index, column) in self.columns.iter().enumerate() {
            if !is_time_field(column) {
                continue;
            }
            for row in &mut self.rows {
                if let Some(converted) = convert_time_value(column, &row[index]) {
                    row[index] = converted;
                }
            }
        }
        self
    }

    /// Keep only rows for which `predicate` holds.
    #[must_use]
    pub fn filter(mut self, predicate: impl Fn(&Record) -> bool) -> Self {
        let columns = self.columns.clone();
        self.rows.retain(|row| {
            let record = columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect::<Record>();
            predicate(&record)
        });
        self
    }

    fn to_record(&self, row: &[Value]) -> Record {
        self.columns
            .iter()
            .cloned()
            .zip(row.iter().cloned())
            .collect()
    }
}

/// Serialized as a sequence of row objects.
impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&self.to_record(row))?;
        }
        seq.end()
    }
}
