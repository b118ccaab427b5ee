//! # huddle-server
//!
//! The real-time fan-out hub.
//!
//! - [`registry`]: username → live session map with atomic add/remove and
//!   consistent snapshots
//! - [`websocket`]: per-session outbound queue, the broadcast engine, and the
//!   session handler state machine
//! - [`history`]: `GET /messages`
//! - [`server`]: axum router, listener, and shutdown handle
//!
//! Text frames are persisted through a [`huddle_store::MessageStore`] and
//! broadcast as `[<username>]: <content>`; binary frames are forwarded to
//! every other session untouched.

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod history;
pub mod hub;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use hub::Hub;
pub use registry::SessionRegistry;
pub use server::{HuddleServer, ServerHandle};
