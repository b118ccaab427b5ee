//! WebSocket session machinery.
//!
//! - [`connection`]: per-session state and bounded outbound queue
//! - [`broadcast`]: fan-out to all sessions but the sender
//! - [`session`]: the per-connection handler state machine

pub mod broadcast;
pub mod connection;
pub mod session;

pub use broadcast::{BroadcastEngine, BroadcastReport};
pub use connection::{ClientSession, Outbound, SendError};
pub use session::{SessionOutcome, SessionPhase, run_session};
