//! Prometheus recorder, metric names, and the error sink.

use huddle_core::HubError;
use metrics::counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

/// Install the global Prometheus recorder.
///
/// Call once at startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Report a hub error: one `warn` log and one `hub_errors_total` increment.
///
/// Errors are never forwarded to clients; this is their only sink.
pub fn record_error(err: &HubError) {
    counter!(HUB_ERRORS_TOTAL, "kind" => err.code()).increment(1);
    warn!(error_kind = err.code(), error = %err, "hub error");
}

/// WebSocket sessions accepted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket sessions closed (counter, labels: outcome).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket sessions (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Session lifetime in seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Frames dropped because a peer queue was full (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Peers evicted by the broadcast engine (counter).
pub const WS_BROADCAST_EVICTIONS_TOTAL: &str = "ws_broadcast_evictions_total";
/// Inbound frames handled (counter, labels: kind).
pub const WS_FRAMES_RECEIVED_TOTAL: &str = "ws_frames_received_total";
/// Hub errors by kind (counter, labels: kind).
pub const HUB_ERRORS_TOTAL: &str = "hub_errors_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_without_global_install() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = handle.render();
        assert!(output.is_empty() || output.contains('\n'));
    }

    #[test]
    fn record_error_without_recorder_is_noop() {
        record_error(&HubError::Transport("reset".into()));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_CONNECTION_DURATION_SECONDS,
            WS_BROADCAST_DROPS_TOTAL,
            WS_BROADCAST_EVICTIONS_TOTAL,
            WS_FRAMES_RECEIVED_TOTAL,
            HUB_ERRORS_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
