//! Persisted chat messages and the text formats seen on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned message identifier (monotonic).
pub type MessageId = i64;

/// A text message as recorded by the message store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Auto-assigned identifier, breaks timestamp ties.
    pub id: MessageId,
    /// Sender username.
    pub username: String,
    /// Message body exactly as received.
    pub content: String,
    /// Server receipt time.
    pub timestamp: DateTime<Utc>,
}

/// One element of the `GET /messages` response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Sender username.
    pub username: String,
    /// Message body.
    pub content: String,
    /// RFC 3339 UTC timestamp.
    pub timestamp: DateTime<Utc>,
}

impl From<StoredMessage> for HistoryEntry {
    fn from(m: StoredMessage) -> Self {
        Self {
            username: m.username,
            content: m.content,
            timestamp: m.timestamp,
        }
    }
}

/// Broadcast form of a chat message: `[<username>]: <content>`.
#[must_use]
pub fn format_chat_line(username: &str, content: &str) -> String {
    format!("[{username}]: {content}")
}

/// Announcement sent to peers when a session becomes active.
#[must_use]
pub fn join_announcement(username: &str) -> String {
    format!("📢 {username} joined the chat!")
}

/// Announcement sent to the remaining peers after a session closes.
#[must_use]
pub fn leave_announcement(username: &str) -> String {
    format!("❌ {username} left the chat.")
}
