//! Live session state.
//!
//! A [`ClientSession`] owns the sending half of a bounded outbound queue.
//! The session's writer task drains the queue onto the socket, so enqueueing
//! never waits on the network and a slow peer only fills its own queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::Utf8Bytes;
use bytes::Bytes;
use huddle_core::{ConnectionId, Frame, Username};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// A frame queued for delivery to one session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// UTF-8 text, shared between all recipients of a broadcast.
    Text(Utf8Bytes),
    /// Raw bytes, shared between all recipients of a broadcast.
    Binary(Bytes),
}

impl Outbound {
    /// Text frame from anything convertible to a `String`.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(Utf8Bytes::from(text.into()))
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
        }
    }
}

impl From<Frame> for Outbound {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Self::Text(Utf8Bytes::from(text)),
            Frame::Binary(data) => Self::Binary(data),
        }
    }
}

/// Why a frame could not be queued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendError {
    /// The queue is at capacity; the frame was dropped for this peer.
    Full,
    /// The writer is gone; the session is dead.
    Closed,
}

/// A connected client bound to a username.
pub struct ClientSession {
    id: ConnectionId,
    username: Username,
    tx: mpsc::Sender<Outbound>,
    dropped_messages: AtomicU64,
    closed: CancellationToken,
}

impl ClientSession {
    /// Create a session around an outbound queue sender.
    pub fn new(username: Username, tx: mpsc::Sender<Outbound>) -> Self {
        Self {
            id: ConnectionId::new(),
            username,
            tx,
            dropped_messages: AtomicU64::new(0),
            closed: CancellationToken::new(),
        }
    }

    /// Create a session together with the receiving half of its queue.
    pub fn with_queue(
        username: Username,
        capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Arc::new(Self::new(username, tx)), rx)
    }

    /// Unique connection ID.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Registered username.
    pub fn username(&self) -> &Username {
        &self.username
    }

    /// Queue a frame without waiting.
    ///
    /// A full queue counts as a dropped message.
    pub fn send(&self, frame: Outbound) -> Result<(), SendError> {
        if self.closed.is_cancelled() {
            return Err(SendError::Closed);
        }
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                Err(SendError::Full)
            }
            Err(TrySendError::Closed(_)) => Err(SendError::Closed),
        }
    }

    /// Total frames dropped because the queue was full.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Close the session. Wakes its reader and writer; idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token cancelled when the session closes.
    pub fn close_token(&self) -> &CancellationToken {
        &self.closed
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("dropped_messages", &self.drop_count())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
