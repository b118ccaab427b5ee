//! # huddle-client
//!
//! Terminal chat client.
//!
//! - [`history`]: fetch `GET /messages` and render it as timestamped lines
//! - [`chat`]: the interactive session, an input task and a receive task
//!   sharing one WebSocket

#![deny(unsafe_code)]

pub mod chat;
pub mod errors;
pub mod history;

pub use chat::{ChatExit, InputCommand, parse_input, run_chat, ws_url};
pub use errors::{ClientError, Result};
pub use history::{fetch_history, render_history_line};
