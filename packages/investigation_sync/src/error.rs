//! Error types for the synchronizer.
//!
//! None of these ever reach the caller of [`crate::Synchronizer`]; they are
//! absorbed into observable state (`connected`, `reconnecting`, `error`) and
//! logged. They exist so each layer can be tested on its own.

/// Failures of the push connection itself.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("response is not an event stream (content-type: {0})")]
    NotEventStream(String),

    #[error("stream body error: {0}")]
    Body(String),

    #[error("stream closed by server")]
    Closed,

    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

impl TransportError {
    /// Retrying cannot fix this failure.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::InvalidTarget(_))
    }
}

/// Reasons a wire payload is discarded before it reaches the event log.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("empty payload")]
    Empty,

    #[error("payload is the literal `undefined`")]
    Undefined,

    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("envelope has no `data` object")]
    MissingData,
}

/// A logged event whose payload does not match its event type.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("malformed {event_type} payload: {source}")]
    Decode {
        event_type: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
