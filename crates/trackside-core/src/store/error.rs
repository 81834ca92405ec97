//! Storage errors

use thiserror::Error;

/// Errors that can occur while recording or querying samples
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Value out of range for column '{column}': {value}")]
    OutOfRange { column: &'static str, value: i64 },
}
