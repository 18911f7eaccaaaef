//! Media frames exchanged between the telephony and upstream connections.

use bytes::Bytes;

/// One opaque message on either connection.
///
/// The relay never looks inside a frame. Each WebSocket data message maps to
/// exactly one `MediaFrame` and back again, so the framing the two external
/// systems agreed on survives the trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaFrame {
    /// A UTF-8 text message (Twilio media events, OpenAI JSON events)
    Text(String),
    /// A binary message
    Binary(Bytes),
}

impl MediaFrame {
    /// Create a text frame.
    pub fn text(text: impl Into<String>) -> Self {
        MediaFrame::Text(text.into())
    }

    /// Create a binary frame.
    pub fn binary(data: impl Into<Bytes>) -> Self {
        MediaFrame::Binary(data.into())
    }

    /// Payload size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            MediaFrame::Text(text) => text.len(),
            MediaFrame::Binary(data) => data.len(),
        }
    }

    /// Whether the payload is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text payload, if this is a text frame.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MediaFrame::Text(text) => Some(text),
            MediaFrame::Binary(_) => None,
        }
    }
}
