//! Stream transport: where the bytes come from.
//!
//! [`Connector`] is the seam the synchronizer opens connections through.
//! [`SseConnector`] is the production implementation over HTTP; tests supply
//! scripted in-memory connectors.

mod http;
mod sse;

use std::future::Future;

use futures::stream::BoxStream;
use reqwest::Url;

use crate::error::TransportError;

pub use http::SseConnector;
pub use sse::{MAX_EVENT_SIZE, SseDecoder};

/// One dispatched SSE event block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
    /// Server-suggested reconnection delay in milliseconds. Carried but not
    /// honored; the retry schedule is fixed.
    pub retry: Option<u64>,
}

impl WireMessage {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: None,
            retry: None,
        }
    }
}

/// An open event stream. Ends with `None` on EOF or yields `Err` on a
/// transport failure.
pub type EventStream = BoxStream<'static, Result<WireMessage, TransportError>>;

/// Opens event streams for investigation targets.
pub trait Connector: Send + Sync + 'static {
    fn connect(
        &self,
        target: &str,
    ) -> impl Future<Output = Result<EventStream, TransportError>> + Send;
}

/// Where investigation streams live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEndpoint {
    pub base_url: String,
    /// Path template; `{id}` is replaced by the investigation id.
    pub stream_path: String,
}

impl StreamEndpoint {
    pub fn new(base_url: impl Into<String>, stream_path: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            stream_path: stream_path.into(),
        }
    }

    /// Resolve a target into a stream URL.
    ///
    /// A target that already is an `http(s)` URL is used as-is; anything else
    /// is treated as an investigation id and substituted into the path.
    pub fn resolve(&self, target: &str) -> Result<Url, TransportError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(TransportError::InvalidTarget("empty target".to_string()));
        }

        if target.starts_with("http://") || target.starts_with("https://") {
            return Url::parse(target)
                .map_err(|e| TransportError::InvalidTarget(format!("{target}: {e}")));
        }

        if target
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '%'))
        {
            return Err(TransportError::InvalidTarget(format!(
                "{target}: not a valid investigation id"
            )));
        }

        let path = self.stream_path.replace("{id}", target);
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&url).map_err(|e| TransportError::InvalidTarget(format!("{url}: {e}")))
    }
}
