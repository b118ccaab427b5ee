//! Fan-out of frames to every live session except the sender.
//!
//! A broadcast takes a registry snapshot, enqueues the frame on each peer's
//! outbound queue without waiting, and only then applies evictions. Peers
//! whose writer is gone are evicted at once. Peers whose queue is full lose
//! the frame and are evicted after `max_total_drops` lifetime drops.

use std::sync::Arc;

use bytes::Bytes;
use huddle_core::{Frame, HubError};
use metrics::counter;
use tracing::{debug, warn};

use super::connection::{ClientSession, Outbound, SendError};
use crate::metrics::{WS_BROADCAST_DROPS_TOTAL, WS_BROADCAST_EVICTIONS_TOTAL};
use crate::registry::SessionRegistry;

/// Default lifetime drops before a slow peer is disconnected.
pub const DEFAULT_MAX_TOTAL_DROPS: u64 = 100;

/// What happened to one broadcast.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Peers the frame was addressed to.
    pub recipients: usize,
    /// Peers whose queue accepted the frame.
    pub delivered: usize,
    /// Peers that missed the frame but stay connected.
    pub dropped: Vec<String>,
    /// Peers removed from the registry.
    pub evicted: Vec<String>,
}

impl BroadcastReport {
    /// Whether every recipient got the frame.
    pub fn is_complete(&self) -> bool {
        self.delivered == self.recipients
    }

    /// `Ok(delivered)` or a [`HubError::PartialBroadcast`].
    pub fn into_result(self) -> Result<usize, HubError> {
        if self.is_complete() {
            Ok(self.delivered)
        } else {
            Err(HubError::PartialBroadcast {
                recipients: self.recipients,
                delivered: self.delivered,
                evicted: self.evicted,
            })
        }
    }
}

/// Broadcasts frames over a shared [`SessionRegistry`].
pub struct BroadcastEngine {
    registry: Arc<SessionRegistry>,
    max_total_drops: u64,
}

impl BroadcastEngine {
    /// Create an engine over `registry`.
    pub fn new(registry: Arc<SessionRegistry>, max_total_drops: u64) -> Self {
        Self {
            registry,
            max_total_drops,
        }
    }

    /// Send `message` to every session except `sender`.
    pub fn broadcast_text(&self, message: &str, sender: &str) -> BroadcastReport {
        self.broadcast(Frame::Text(message.to_owned()), sender)
    }

    /// Send `payload` unchanged to every session except `sender`.
    pub fn broadcast_binary(&self, payload: Bytes, sender: &str) -> BroadcastReport {
        self.broadcast(Frame::Binary(payload), sender)
    }

    /// Send `frame` to every session except `sender`. The payload is shared,
    /// not copied, between recipients.
    pub fn broadcast(&self, frame: Frame, sender: &str) -> BroadcastReport {
        let len = frame.len();
        let report = self.fan_out(&Outbound::from(frame), sender);
        debug!(
            len,
            sender,
            recipients = report.recipients,
            delivered = report.delivered,
            "broadcast frame"
        );
        report
    }

    fn fan_out(&self, frame: &Outbound, sender: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut to_evict: Vec<Arc<ClientSession>> = Vec::new();

        for peer in self.registry.snapshot() {
            if peer.username().as_str() == sender {
                continue;
            }
            report.recipients += 1;
            match peer.send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(SendError::Closed) => {
                    debug!(username = %peer.username(), conn_id = %peer.id(), "peer queue closed");
                    to_evict.push(peer);
                }
                Err(SendError::Full) => {
                    counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                    let drops = peer.drop_count();
                    if drops >= self.max_total_drops {
                        warn!(username = %peer.username(), drops, "disconnecting slow client");
                        to_evict.push(peer);
                    } else {
                        warn!(
                            username = %peer.username(),
                            total_drops = drops,
                            "failed to queue frame for client (queue full)"
                        );
                        report.dropped.push(peer.username().to_string());
                    }
                }
            }
        }

        for peer in to_evict {
            if self.registry.remove_session(&peer) {
                counter!(WS_BROADCAST_EVICTIONS_TOTAL).increment(1);
            }
            peer.close();
            report.evicted.push(peer.username().to_string());
        }

        debug!(kind = frame.kind(), evicted = report.evicted.len(), "fan-out done");
        report
    }
}
