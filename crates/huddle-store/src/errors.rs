//! Error types for the message store.

use huddle_core::HubError;
use thiserror::Error;

/// Errors that can occur during message store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// A stored timestamp could not be parsed.
    #[error("invalid timestamp for message {id}: {value}")]
    InvalidTimestamp {
        /// Row identifier.
        id: i64,
        /// Raw column value.
        value: String,
    },

    /// The blocking task running a query failed.
    #[error("store task failed: {0}")]
    Task(String),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for HubError {
    fn from(err: StoreError) -> Self {
        HubError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_error_display() {
        let err = StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows);
        assert!(err.to_string().contains("sqlite error"));
    }

    #[test]
    fn migration_error_display() {
        let err = StoreError::Migration {
            message: "v1 failed".into(),
        };
        assert_eq!(err.to_string(), "migration error: v1 failed");
    }

    #[test]
    fn converts_into_persistence_hub_error() {
        let err: HubError = StoreError::Task("cancelled".into()).into();
        assert_eq!(err.code(), "persistence");
        assert!(err.to_string().contains("cancelled"));
    }
}
