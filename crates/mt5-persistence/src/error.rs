//! Export error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Table already exists: {0}")]
    TableExists(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;
