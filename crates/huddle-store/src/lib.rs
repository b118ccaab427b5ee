//! # huddle-store
//!
//! Durable storage for chat text messages.
//!
//! - [`MessageStore`]: the async interface the hub talks to
//! - [`SqliteMessageStore`]: `SQLite` implementation over an `r2d2` pool,
//!   running blocking database work on the tokio blocking pool
//! - [`sqlite`]: connection pool, migrations, and the stateless
//!   [`MessageRepo`](sqlite::repositories::MessageRepo)
//!
//! Binary frames are never stored; only accepted text messages are.

#![deny(unsafe_code)]

pub mod errors;
pub mod sqlite;
pub mod store;

pub use errors::{Result, StoreError};
pub use store::{MessageStore, SqliteMessageStore};
