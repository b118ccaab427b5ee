//! Message history shown before the live session starts.

use chrono::{DateTime, NaiveDateTime};
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{ClientError, Result};

/// Placeholder shown when an entry's timestamp cannot be read.
pub const UNKNOWN_TIME: &str = "--:--:--";

/// A `GET /messages` element, kept loose so one odd row cannot fail the
/// whole listing.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct RawHistoryEntry {
    /// Sender username.
    pub username: String,
    /// Message body.
    pub content: String,
    /// Timestamp as sent by the server.
    #[serde(default)]
    pub timestamp: String,
}

/// `<server>/messages`, appended under any path prefix on `server`.
pub fn history_url(server: &Url) -> Result<Url> {
    let mut url = server.clone();
    let _ = url
        .path_segments_mut()
        .map_err(|()| ClientError::InvalidUrl(server.to_string()))?
        .pop_if_empty()
        .push("messages");
    Ok(url)
}

/// Fetch recent history from `server`.
pub async fn fetch_history(server: &Url) -> Result<Vec<RawHistoryEntry>> {
    let url = history_url(server)?;
    debug!(%url, "fetching history");
    let entries = reqwest::get(url)
        .await?
        .error_for_status()?
        .json::<Vec<RawHistoryEntry>>()
        .await?;
    Ok(entries)
}

/// `HH:MM:SS` of an ISO-8601 timestamp, in the offset it was written with.
pub fn clock_time(timestamp: &str) -> Option<String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(ts.format("%H:%M:%S").to_string());
    }
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|ts| ts.format("%H:%M:%S").to_string())
}

/// `[HH:MM:SS] <username>: <content>`.
pub fn render_history_line(entry: &RawHistoryEntry) -> String {
    let time = clock_time(&entry.timestamp);
    format!(
        "[{}] {}: {}",
        time.as_deref().unwrap_or(UNKNOWN_TIME),
        entry.username,
        entry.content
    )
}
