//! The unit exchanged over a session.

use bytes::Bytes;

/// One inbound or outbound payload. Text frames carry UTF-8, binary frames
/// carry opaque bytes (audio) that the hub never inspects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text.
    Text(String),
    /// Raw bytes, forwarded untouched.
    Binary(Bytes),
}

impl Frame {
    /// Short label for logs and metric labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
        }
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(t) => t.len(),
            Self::Binary(b) => b.len(),
        }
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels() {
        assert_eq!(Frame::Text("hi".into()).kind(), "text");
        assert_eq!(Frame::Binary(Bytes::from_static(&[1, 2])).kind(), "binary");
    }

    #[test]
    fn len_counts_bytes() {
        assert_eq!(Frame::Text("ğ".into()).len(), 2);
        assert_eq!(Frame::Binary(Bytes::from_static(&[0; 4])).len(), 4);
        assert!(Frame::Binary(Bytes::new()).is_empty());
    }
}
