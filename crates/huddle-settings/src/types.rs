//! Settings types.
//!
//! Every struct uses `camelCase` keys and `#[serde(default)]`, so a partial
//! settings file only needs to name the values it changes.

use std::path::{Path, PathBuf};

use huddle_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Database path that selects a non-persistent in-memory store.
pub const IN_MEMORY_DB: &str = ":memory:";

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HuddleSettings {
    /// Network and fan-out settings.
    pub server: ServerSettings,
    /// History endpoint settings.
    pub history: HistorySettings,
    /// Message store settings.
    pub storage: StorageSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl HuddleSettings {
    /// Reject combinations no component can run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.outbound_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.outboundQueueCapacity must be at least 1".into(),
            ));
        }
        if self.history.max_limit == 0 {
            return Err(SettingsError::InvalidValue(
                "history.maxLimit must be at least 1".into(),
            ));
        }
        if self.history.default_limit > self.history.max_limit {
            return Err(SettingsError::InvalidValue(format!(
                "history.defaultLimit ({}) exceeds history.maxLimit ({})",
                self.history.default_limit, self.history.max_limit
            )));
        }
        if self.storage.pool_size == 0 {
            return Err(SettingsError::InvalidValue(
                "storage.poolSize must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Server network and fan-out settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Per-session outbound queue length.
    pub outbound_queue_capacity: usize,
    /// Lifetime dropped frames before a slow peer is evicted.
    pub max_total_drops: u64,
    /// Largest accepted WebSocket message, in bytes.
    pub max_message_size: usize,
    /// How long shutdown waits for the server task.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            outbound_queue_capacity: 256,
            max_total_drops: 100,
            max_message_size: 4 * 1024 * 1024,
            shutdown_timeout_secs: 10,
        }
    }
}

/// History endpoint settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistorySettings {
    /// Messages returned when no `limit` is given.
    pub default_limit: usize,
    /// Upper bound applied to a requested `limit`.
    pub max_limit: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 500,
        }
    }
}

/// Message store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Database file, relative to the huddle home unless absolute.
    /// `:memory:` keeps messages in memory only.
    pub db_path: String,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_path: "huddle.db".to_string(),
            pool_size: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

impl StorageSettings {
    /// Whether the configured database is in-memory.
    pub fn is_in_memory(&self) -> bool {
        self.db_path == IN_MEMORY_DB
    }

    /// Resolve `db_path` against `home` when it is relative.
    pub fn resolved_db_path(&self, home: &Path) -> PathBuf {
        let path = Path::new(&self.db_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            home.join(path)
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
