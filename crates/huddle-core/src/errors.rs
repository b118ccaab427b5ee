//! Error taxonomy for the hub.
//!
//! Every failure the hub observes is classified into one [`HubError`]
//! variant. None of them is fatal to the process; each is scoped to the
//! session or message that produced it. [`HubError::code`] gives a stable,
//! machine-readable label used in logs and metrics.

use thiserror::Error;

/// Failures the hub can observe.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HubError {
    /// A session for this username is already registered.
    #[error("username already connected: {0}")]
    DuplicateUsername(String),

    /// The supplied username cannot be used.
    #[error("invalid username: {0}")]
    InvalidUsername(String),

    /// A read or write on a session's transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The message store rejected a write or read.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A broadcast did not reach every recipient.
    #[error("broadcast reached {delivered} of {recipients} recipients (evicted: {evicted:?})")]
    PartialBroadcast {
        /// Peers the frame was addressed to.
        recipients: usize,
        /// Peers whose queue accepted the frame.
        delivered: usize,
        /// Peers removed from the registry as a result.
        evicted: Vec<String>,
    },
}

impl HubError {
    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateUsername(_) => "duplicate_username",
            Self::InvalidUsername(_) => "invalid_username",
            Self::Transport(_) => "transport",
            Self::Persistence(_) => "persistence",
            Self::PartialBroadcast { .. } => "partial_broadcast",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_snake_case() {
        let all = [
            HubError::DuplicateUsername("a".into()),
            HubError::InvalidUsername("b".into()),
            HubError::Transport("c".into()),
            HubError::Persistence("d".into()),
            HubError::PartialBroadcast {
                recipients: 2,
                delivered: 1,
                evicted: vec!["x".into()],
            },
        ];
        for err in &all {
            let code = err.code();
            assert!(
                code.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "code '{code}' must be snake_case"
            );
        }
    }

    #[test]
    fn display_includes_context() {
        let err = HubError::DuplicateUsername("alice".into());
        assert_eq!(err.to_string(), "username already connected: alice");

        let err = HubError::PartialBroadcast {
            recipients: 3,
            delivered: 2,
            evicted: vec!["carol".into()],
        };
        let text = err.to_string();
        assert!(text.contains("2 of 3"));
        assert!(text.contains("carol"));
    }
}
