//! Message repository: inserts and recency queries on `messages`.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with
//! microsecond precision (`2026-03-01T12:30:05.000000Z`), so ordering the
//! column lexically orders it chronologically.

use chrono::{DateTime, SecondsFormat, Utc};
use huddle_core::{MessageId, StoredMessage};
use rusqlite::{Connection, Row, params};

use crate::errors::{Result, StoreError};

/// Raw `messages` row before timestamp parsing.
struct MessageRow {
    id: i64,
    username: String,
    content: String,
    timestamp: String,
}

/// Message repository. Stateless; every method takes `&Connection`.
pub struct MessageRepo;

impl MessageRepo {
    /// Insert one message and return its id.
    pub fn insert(
        conn: &Connection,
        username: &str,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<MessageId> {
        let _ = conn.execute(
            "INSERT INTO messages (username, content, timestamp) VALUES (?1, ?2, ?3)",
            params![username, content, encode_timestamp(timestamp)],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// The `limit` most recent messages, returned oldest first.
    pub fn list_recent(conn: &Connection, limit: usize) -> Result<Vec<StoredMessage>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(
            "SELECT id, username, content, timestamp FROM (
                 SELECT id, username, content, timestamp FROM messages
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?1
             )
             ORDER BY timestamp ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![limit], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(decode_row).collect()
    }

    /// Total stored messages.
    pub fn count(conn: &Connection) -> Result<u64> {
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
        Ok(MessageRow {
            id: row.get(0)?,
            username: row.get(1)?,
            content: row.get(2)?,
            timestamp: row.get(3)?,
        })
    }
}

fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_row(row: MessageRow) -> Result<StoredMessage> {
    let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)
        .map_err(|_| StoreError::InvalidTimestamp {
            id: row.id,
            value: row.timestamp.clone(),
        })?
        .with_timezone(&Utc);
    Ok(StoredMessage {
        id: row.id,
        username: row.username,
        content: row.content,
        timestamp,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
