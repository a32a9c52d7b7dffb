use futures::{StreamExt, stream};
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use tracing::debug;

use super::{Connector, EventStream, SseDecoder, StreamEndpoint};
use crate::error::TransportError;

const EVENT_STREAM: &str = "text/event-stream";

/// Opens investigation streams over HTTP.
///
/// Connecting succeeds once the server answers with a 2xx status and an
/// `text/event-stream` content type; the body is then decoded lazily as the
/// caller polls the stream. Connection timeouts are left to the transport:
/// a push stream has no natural read deadline.
#[derive(Debug, Clone)]
pub struct SseConnector {
    client: reqwest::Client,
    endpoint: StreamEndpoint,
}

impl SseConnector {
    pub fn new(endpoint: StreamEndpoint, user_agent: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client, endpoint })
    }
}

impl Connector for SseConnector {
    async fn connect(&self, target: &str) -> Result<EventStream, TransportError> {
        let url = self.endpoint.resolve(target)?;
        debug!(%url, "opening event stream");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, EVENT_STREAM)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with(EVENT_STREAM) {
            return Err(TransportError::NotEventStream(content_type));
        }

        let mut decoder = SseDecoder::new();
        let messages = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder.feed(&bytes).into_iter().map(Ok).collect::<Vec<_>>(),
                Err(e) => vec![Err(TransportError::Body(e.to_string()))],
            })
            .flat_map(stream::iter);

        Ok(messages.boxed())
    }
}
