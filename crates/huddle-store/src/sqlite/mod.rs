//! `SQLite` backend for the message store.
//!
//! - **[`connection`]**: `r2d2` pool with WAL mode and busy timeout applied to
//!   every connection.
//! - **[`migrations`]**: version-tracked schema, embedded at compile time and
//!   applied transactionally.
//! - **[`repositories`]**: stateless repositories; each method takes
//!   `&Connection` and executes SQL.

pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{ConnectionConfig, ConnectionPool, new_file, new_in_memory};
pub use migrations::{current_version, latest_version, run_migrations};
