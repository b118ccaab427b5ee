//! Server configuration.

use std::time::Duration;

use huddle_settings::HuddleSettings;

use crate::shutdown::DEFAULT_SHUTDOWN_TIMEOUT;

/// Runtime configuration for [`HuddleServer`](crate::HuddleServer).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Per-session outbound queue length.
    pub outbound_queue_capacity: usize,
    /// Lifetime dropped frames before a slow peer is evicted.
    pub max_total_drops: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// `GET /messages` limit when none is given.
    pub history_default_limit: usize,
    /// Upper bound for a requested history limit.
    pub history_max_limit: usize,
    /// How long shutdown waits for the server task.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            outbound_queue_capacity: 256,
            max_total_drops: 100,
            max_message_size: 4 * 1024 * 1024,
            history_default_limit: 50,
            history_max_limit: 500,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &HuddleSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            outbound_queue_capacity: settings.server.outbound_queue_capacity,
            max_total_drops: settings.server.max_total_drops,
            max_message_size: settings.server.max_message_size,
            history_default_limit: settings.history.default_limit,
            history_max_limit: settings.history.max_limit,
            shutdown_timeout: Duration::from_secs(settings.server.shutdown_timeout_secs),
        }
    }

    /// `host:port` bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_is_zero() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 0);
        assert_eq!(cfg.bind_addr(), "127.0.0.1:0");
    }

    #[test]
    fn default_history_limits() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.history_default_limit, 50);
        assert_eq!(cfg.history_max_limit, 500);
    }

    #[test]
    fn from_settings_copies_values() {
        let mut settings = HuddleSettings::default();
        settings.server.port = 9100;
        settings.server.outbound_queue_capacity = 8;
        settings.server.max_total_drops = 3;
        settings.history.default_limit = 20;
        settings.server.shutdown_timeout_secs = 2;

        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.outbound_queue_capacity, 8);
        assert_eq!(cfg.max_total_drops, 3);
        assert_eq!(cfg.history_default_limit, 20);
        assert_eq!(cfg.shutdown_timeout, Duration::from_secs(2));
    }
}
