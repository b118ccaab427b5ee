//! The message store interface and its `SQLite` implementation.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use huddle_core::{MessageId, StoredMessage};
use metrics::counter;
use rusqlite::Connection;
use tracing::{debug, instrument, warn};

use crate::errors::{Result, StoreError};
use crate::sqlite::connection::{self, ConnectionConfig, ConnectionPool};
use crate::sqlite::migrations::run_migrations;
use crate::sqlite::repositories::MessageRepo;

/// Durable storage for accepted text messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Record a message. The returned id is monotonic.
    async fn append(
        &self,
        username: &str,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<MessageId>;

    /// Up to `limit` most recent messages, oldest first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<StoredMessage>>;
}

/// [`MessageStore`] backed by a pooled `SQLite` database.
#[derive(Clone)]
pub struct SqliteMessageStore {
    pool: ConnectionPool,
}

impl SqliteMessageStore {
    const SQLITE_BUSY_MAX_RETRIES: u32 = 5;

    /// Open (or create) a database file and bring its schema up to date.
    pub fn open(path: &Path, config: &ConnectionConfig) -> Result<Self> {
        Self::from_pool(connection::new_file(path, config)?)
    }

    /// Non-persistent store, mainly for tests and ephemeral hubs.
    pub fn in_memory() -> Result<Self> {
        Self::from_pool(connection::new_in_memory(&ConnectionConfig::default())?)
    }

    /// Wrap an existing pool, running pending migrations first.
    pub fn from_pool(pool: ConnectionPool) -> Result<Self> {
        {
            let conn = pool.get()?;
            let _ = run_migrations(&conn)?;
        }
        Ok(Self { pool })
    }

    /// Total stored messages.
    pub async fn count(&self) -> Result<u64> {
        self.run_blocking(MessageRepo::count).await
    }

    /// Run `f` on a pooled connection on the blocking pool.
    async fn run_blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: Fn(&Connection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            retry_on_sqlite_busy(|| {
                let conn = pool.get()?;
                f(&conn)
            })
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    #[instrument(skip(self, content), fields(len = content.len()))]
    async fn append(
        &self,
        username: &str,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<MessageId> {
        let username = username.to_owned();
        let content = content.to_owned();
        let id = self
            .run_blocking(move |conn| MessageRepo::insert(conn, &username, &content, timestamp))
            .await?;
        counter!("messages_persisted_total").increment(1);
        debug!(id, "message persisted");
        Ok(id)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<StoredMessage>> {
        self.run_blocking(move |conn| MessageRepo::list_recent(conn, limit))
            .await
    }
}

fn is_sqlite_busy_or_locked(err: &StoreError) -> bool {
    match err {
        StoreError::Sqlite(rusqlite::Error::SqliteFailure(code, _)) => matches!(
            code.code,
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
        ),
        _ => false,
    }
}

/// Retry on `SQLite` BUSY/LOCKED with linear backoff and ±25% jitter.
fn retry_on_sqlite_busy<T>(mut f: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempts = 0;
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(err)
                if is_sqlite_busy_or_locked(&err)
                    && attempts < SqliteMessageStore::SQLITE_BUSY_MAX_RETRIES =>
            {
                attempts += 1;
                let base_ms = u64::from(attempts).saturating_mul(10).min(500);
                let jitter_range = base_ms / 4;
                let jitter = if jitter_range > 0 {
                    rand::random::<u64>() % (jitter_range * 2 + 1)
                } else {
                    0
                };
                let backoff_ms = base_ms.saturating_sub(jitter_range) + jitter;
                warn!(attempts, backoff_ms, "sqlite busy, retrying");
                std::thread::sleep(Duration::from_millis(backoff_ms));
            }
            Err(err) => return Err(err),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
