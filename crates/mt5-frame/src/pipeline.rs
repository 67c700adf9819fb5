//! Post-processing applied uniformly to query results.

use mt5_core::Mt5Result;

use crate::normalize::convert_time_fields;
use crate::record::Record;
use crate::table::Table;

/// One `Table -> Table` step.
pub trait Transform: Send + Sync {
    fn apply(&self, table: Table) -> Mt5Result<Table>;

    fn name(&self) -> &'static str;
}

/// Numeric `time`/`time_*` columns become timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertTimeFields;

impl Transform for ConvertTimeFields {
    fn apply(&self, table: Table) -> Mt5Result<Table> {
        Ok(table.convert_time_fields())
    }

    fn name(&self) -> &'static str {
        "convert_time_fields"
    }
}

/// Designates the lookup key columns.
#[derive(Debug, Clone)]
pub struct PromoteKey {
    columns: Vec<String>,
}

impl PromoteKey {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }
}

impl Transform for PromoteKey {
    fn apply(&self, mut table: Table) -> Mt5Result<Table> {
        table.set_key(&self.columns)?;
        Ok(table)
    }

    fn name(&self) -> &'static str {
        "promote_key"
    }
}

/// Caller options for table-returning queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameOptions {
    /// Convert epoch time fields to timestamps (default `true`).
    pub convert_time: bool,
    /// Lookup key columns (default none).
    pub key: Option<Vec<String>>,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            convert_time: true,
            key: None,
        }
    }
}

impl FrameOptions {
    /// Leave epoch values untouched.
    pub fn raw() -> Self {
        Self {
            convert_time: false,
            key: None,
        }
    }

    #[must_use]
    pub fn with_key(mut self, columns: &[&str]) -> Self {
        self.key = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    #[must_use]
    pub fn without_time_conversion(mut self) -> Self {
        self.convert_time = false;
        self
    }
}

/// Ordered list of transforms built from [`FrameOptions`].
pub struct Pipeline {
    convert_time: bool,
    steps: Vec<Box<dyn Transform>>,
}

impl Pipeline {
    pub fn from_options(options: &FrameOptions) -> Self {
        let mut steps: Vec<Box<dyn Transform>> = Vec::new();
        if options.convert_time {
            steps.push(Box::new(ConvertTimeFields));
        }
        if let Some(key) = &options.key {
            steps.push(Box::new(PromoteKey::new(key.clone())));
        }
        Self {
            convert_time: options.convert_time,
            steps,
        }
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Assemble `records` into a table and run every step over it.
    pub fn run(&self, records: Vec<Record>) -> Mt5Result<Table> {
        let mut table = Table::from_records(records);
        for step in &self.steps {
            table = step.apply(table)?;
        }
        Ok(table)
    }

    /// Single-record form: only time conversion applies.
    pub fn run_record(&self, record: Record) -> Record {
        if self.convert_time {
            convert_time_fields(record)
        } else {
            record
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;

    fn rate(time: i64) -> Record {
        Record::new().with("time", time).with("close", 1.0)
    }

    #[test]
    fn test_default_options_convert_time_only() {
        let pipeline = Pipeline::from_options(&FrameOptions::default());
        assert_eq!(pipeline.step_names(), vec!["convert_time_fields"]);

        let table = pipeline.run(vec![rate(60)]).unwrap();
        assert!(table.value(0, "time").and_then(Value::as_time).is_some());
        assert!(table.key().is_empty());
    }

    #[test]
    fn test_raw_options_keep_epochs() {
        let pipeline = Pipeline::from_options(&FrameOptions::raw().with_key(&["time"]));
        assert_eq!(pipeline.step_names(), vec!["promote_key"]);

        let table = pipeline.run(vec![rate(60)]).unwrap();
        assert_eq!(table.value(0, "time"), Some(&Value::Int(60)));
        assert_eq!(table.key(), ["time"]);
    }

    #[test]
    fn test_key_is_found_after_time_conversion() {
        let pipeline = Pipeline::from_options(&FrameOptions::default().with_key(&["time"]));
        let table = pipeline.run(vec![rate(60), rate(120)]).unwrap();

        let t = table.value(1, "time").cloned().unwrap();
        let row = table.find(&[t]).unwrap();
        assert_eq!(row.get("close"), Some(&Value::Float(1.0)));
    }

    #[test]
    fn test_empty_input_with_key_is_empty_table() {
        let pipeline = Pipeline::from_options(&FrameOptions::default().with_key(&["ticket"]));
        let table = pipeline.run(Vec::new()).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_run_record_respects_toggle() {
        let record = Record::new().with("time", 60_i64);
        let raw = Pipeline::from_options(&FrameOptions::raw()).run_record(record.clone());
        assert_eq!(raw, record);

        let converted = Pipeline::from_options(&FrameOptions::default()).run_record(record);
        assert!(converted.get("time").and_then(Value::as_time).is_some());
    }
}
