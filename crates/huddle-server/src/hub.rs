//! Shared hub state handed to every session handler.

use std::sync::Arc;

use huddle_store::MessageStore;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::registry::SessionRegistry;
use crate::websocket::broadcast::BroadcastEngine;

/// Registry, broadcast engine, and store shared by all sessions.
pub struct Hub {
    /// Live sessions.
    pub registry: Arc<SessionRegistry>,
    /// Fan-out over `registry`.
    pub broadcast: BroadcastEngine,
    /// Text message persistence.
    pub store: Arc<dyn MessageStore>,
    /// Outbound queue length for new sessions.
    pub outbound_queue_capacity: usize,
    /// Cancelled when the server shuts down.
    pub shutdown: CancellationToken,
}

impl Hub {
    /// Build a hub with an empty registry.
    pub fn new(
        store: Arc<dyn MessageStore>,
        config: &ServerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        Self {
            broadcast: BroadcastEngine::new(Arc::clone(&registry), config.max_total_drops),
            registry,
            store,
            outbound_queue_capacity: config.outbound_queue_capacity.max(1),
            shutdown,
        }
    }
}
