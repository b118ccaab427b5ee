//! `GET /messages`: recent text messages, oldest first.

use axum::extract::{Query, State};
use axum::response::Json;
use huddle_core::HistoryEntry;
use huddle_store::MessageStore;
use serde::Deserialize;
use tracing::debug;

use crate::metrics::record_error;
use crate::server::AppState;

/// Query string for `GET /messages`.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Maximum entries to return.
    pub limit: Option<usize>,
}

/// Limit to apply: the requested one or `default`, never above `max`.
pub fn effective_limit(requested: Option<usize>, default: usize, max: usize) -> usize {
    requested.unwrap_or(default).min(max)
}

/// The most recent `limit` messages in ascending order.
///
/// A store failure is reported and yields an empty list.
pub async fn recent_history(store: &dyn MessageStore, limit: usize) -> Vec<HistoryEntry> {
    match store.list_recent(limit).await {
        Ok(messages) => messages.into_iter().map(HistoryEntry::from).collect(),
        Err(e) => {
            record_error(&e.into());
            Vec::new()
        }
    }
}

/// GET /messages
pub async fn history_handler(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<HistoryEntry>> {
    let limit = effective_limit(
        query.limit,
        state.config.history_default_limit,
        state.config.history_max_limit,
    );
    let entries = recent_history(state.hub.store.as_ref(), limit).await;
    debug!(limit, returned = entries.len(), "served history");
    Json(entries)
}
