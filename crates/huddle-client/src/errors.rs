//! Client error types.

use thiserror::Error;

/// Errors raised by the terminal client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server URL could not be used.
    #[error("invalid server url: {0}")]
    InvalidUrl(String),
    /// An HTTP request failed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The WebSocket connection failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    /// Terminal I/O failed.
    #[error("terminal i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
