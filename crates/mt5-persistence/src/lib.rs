//! Export of [`Table`](mt5_frame::Table) results to files.
//!
//! - CSV: header row from the table's columns, timestamps as RFC 3339
//! - SQLite: table creation policy plus duplicate removal on the key columns

pub mod csv_writer;
pub mod error;
pub mod sqlite;

pub use csv_writer::{write_csv, write_csv_to};
pub use error::{PersistenceError, PersistenceResult};
pub use sqlite::{is_identifier, write_sqlite, write_sqlite_file, IfExists};
