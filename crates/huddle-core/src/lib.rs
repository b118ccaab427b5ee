//! # huddle-core
//!
//! Shared vocabulary for the huddle hub and its clients:
//!
//! - **IDs**: [`Username`] (validated, verbatim) and [`ConnectionId`] (UUID v7)
//! - **Frames**: [`Frame`], the text-or-binary unit exchanged over a session
//! - **Messages**: persisted [`StoredMessage`], wire [`HistoryEntry`], and the
//!   text formats used for chat lines and presence announcements
//! - **Errors**: [`HubError`] taxonomy with stable codes
//! - **Logging**: [`logging::init_subscriber`]

#![deny(unsafe_code)]

pub mod errors;
pub mod frame;
pub mod ids;
pub mod logging;
pub mod messages;

pub use errors::HubError;
pub use frame::Frame;
pub use ids::{ConnectionId, Username};
pub use messages::{HistoryEntry, MessageId, StoredMessage};
