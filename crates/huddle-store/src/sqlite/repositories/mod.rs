//! Stateless repositories over a borrowed `&Connection`.

pub mod message;

pub use message::MessageRepo;
