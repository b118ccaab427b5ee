//! `SQLite` connection pool.
//!
//! [`PragmaCustomizer`] runs on each new connection to set WAL mode, the
//! busy timeout, and `synchronous = NORMAL`.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::errors::Result;

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// How long a caller waits for a free pooled connection.
const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the connection pool.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Maximum pool size (default: 8).
    pub pool_size: u32,
    /// Busy timeout in milliseconds (default: 5000).
    pub busy_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug)]
struct PragmaCustomizer {
    busy_timeout_ms: u64,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;\
             PRAGMA busy_timeout = {};\
             PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms
        ))
    }
}

/// Create an in-memory connection pool.
///
/// Every `SQLite` in-memory connection is a separate database, so the pool
/// is capped at one connection regardless of `config.pool_size`. That
/// connection is never reaped: a replacement would be an empty database.
pub fn new_in_memory(config: &ConnectionConfig) -> Result<ConnectionPool> {
    let builder = Pool::builder()
        .max_size(1)
        .min_idle(Some(1))
        .max_lifetime(None)
        .idle_timeout(None);
    build(builder, SqliteConnectionManager::memory(), config)
}

/// Create a file-backed connection pool.
pub fn new_file(path: &std::path::Path, config: &ConnectionConfig) -> Result<ConnectionPool> {
    let builder = Pool::builder().max_size(config.pool_size);
    build(builder, SqliteConnectionManager::file(path), config)
}

fn build(
    builder: r2d2::Builder<SqliteConnectionManager>,
    manager: SqliteConnectionManager,
    config: &ConnectionConfig,
) -> Result<ConnectionPool> {
    let pool = builder
        .connection_timeout(CHECKOUT_TIMEOUT)
        .connection_customizer(Box::new(PragmaCustomizer {
            busy_timeout_ms: config.busy_timeout_ms,
        }))
        .build(manager)?;
    Ok(pool)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
