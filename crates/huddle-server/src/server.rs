//! `HuddleServer`: axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use futures::StreamExt;
use huddle_core::Username;
use huddle_store::MessageStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::history::history_handler;
use crate::hub::Hub;
use crate::metrics::record_error;
use crate::shutdown::{DrainReport, ShutdownCoordinator};
use crate::websocket::run_session;

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Registry, broadcast engine, and store.
    pub hub: Arc<Hub>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle backing `/metrics`, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The chat hub server.
pub struct HuddleServer {
    config: Arc<ServerConfig>,
    hub: Arc<Hub>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl HuddleServer {
    /// Create a server persisting text messages to `store`.
    pub fn new(config: ServerConfig, store: Arc<dyn MessageStore>) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let hub = Arc::new(Hub::new(store, &config, shutdown.token()));
        Self {
            config: Arc::new(config),
            hub,
            shutdown,
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: Arc::clone(&self.hub),
            config: Arc::clone(&self.config),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/ws/{username}", get(ws_handler))
            .route("/messages", get(history_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve in a background task.
    pub async fn listen(&self) -> std::io::Result<ServerHandle> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
        });

        info!(%addr, "huddle server listening");
        Ok(ServerHandle {
            addr,
            task,
            shutdown: Arc::clone(&self.shutdown),
            hub: Arc::clone(&self.hub),
        })
    }

    /// The shared hub.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// A running server.
pub struct ServerHandle {
    addr: SocketAddr,
    task: JoinHandle<()>,
    shutdown: Arc<ShutdownCoordinator>,
    hub: Arc<Hub>,
}

impl ServerHandle {
    /// Bound address (with the real port when configured with `0`).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The shared hub.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Stop accepting, end every session, and wait up to `timeout`.
    pub async fn shutdown(self, timeout: Duration) -> DrainReport {
        let report = self
            .shutdown
            .graceful_shutdown(self.task, &self.hub.registry, timeout)
            .await;
        info!(
            remaining = report.sessions_remaining,
            clean = report.is_clean(),
            "huddle server stopped"
        );
        report
    }
}

/// GET /ws/{username}
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(username): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let username = match Username::parse(username) {
        Ok(username) => username,
        Err(e) => {
            record_error(&e);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };
    let hub = Arc::clone(&state.hub);
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| async move {
            let (sink, stream) = socket.split();
            let _ = run_session(stream, sink, username, hub).await;
        })
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.hub.registry.len(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
