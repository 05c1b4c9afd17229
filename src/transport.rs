//! Transport interface.
//!
//! The listener that frames wire bytes into messages lives outside
//! this crate. The reader loop consumes anything implementing
//! [`Transport`], one framed message at a time, with templates and
//! data records already separated and each data record carrying its
//! template id.

use crate::template::Template;

use serde::Serialize;

/// One data record as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataRecord {
    pub template_id: u16,
    pub payload: Vec<u8>,
}

/// One framed export message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageBuf {
    /// Export time from the message header, in Unix milliseconds.
    pub export_time_ms: u64,
    /// Observation domain (V9 source id) scoping the templates.
    pub observation_domain: u32,
    /// Templates announced in this message, in arrival order.
    pub templates: Vec<Template>,
    /// Data records in transport order.
    pub records: Vec<DataRecord>,
}

/// Errors the transport wait can surface. The reader loop classifies
/// these into continue-or-die; only [`TransportError::Fatal`] ends the
/// session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The wait was interrupted before a full message arrived.
    Interrupted,
    /// The current message is exhausted.
    EndOfMessage,
    /// An incoming connection was rejected (wrong peer, TLS failure).
    ConnectionRejected,
    /// A connection-oriented peer closed its connection.
    ConnectionClosed,
    /// Malformed content inside one exporter's sub-stream; the
    /// session's templates remain valid.
    Protocol(String),
    /// Structurally invalid message framing.
    Structure(String),
    /// Unrecoverable listener failure.
    Fatal(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Interrupted => f.write_str("interrupted read"),
            TransportError::EndOfMessage => f.write_str("end of message"),
            TransportError::ConnectionRejected => f.write_str("connection rejected"),
            TransportError::ConnectionClosed => f.write_str("connection closed"),
            TransportError::Protocol(msg) => write!(f, "exporter protocol error: {}", msg),
            TransportError::Structure(msg) => write!(f, "invalid message structure: {}", msg),
            TransportError::Fatal(msg) => write!(f, "transport failure: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// Source of framed export messages.
pub trait Transport {
    /// Blocks for the next message. The implementation is expected to
    /// return promptly once the session is being torn down.
    fn next_message(&mut self) -> Result<MessageBuf, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(TransportError::Interrupted.to_string(), "interrupted read");
        assert_eq!(
            TransportError::Protocol("bad set length".into()).to_string(),
            "exporter protocol error: bad set length"
        );
    }
}
