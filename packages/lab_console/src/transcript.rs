//! Recorded SSE transcripts: the `lab replay` input and the `lab watch
//! --record` output.

use std::path::Path;

use anyhow::{Context, Result};
use investigation_sync::{RawEvent, SseDecoder, WireMessage};

/// Decode a transcript file into wire messages.
///
/// A transcript cut off without the final blank line still yields its last
/// event.
pub fn read(path: &Path) -> Result<Vec<WireMessage>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read transcript: {}", path.display()))?;

    let mut decoder = SseDecoder::new();
    let mut messages = decoder.feed(&bytes);
    messages.extend(decoder.feed(b"\n\n"));
    Ok(messages)
}

/// Render logged events back into SSE, one block per event.
pub fn encode(events: &[RawEvent]) -> Result<String> {
    let mut out = String::new();
    for event in events {
        let envelope = serde_json::json!({ "data": event.payload });
        let data = serde_json::to_string(&envelope)
            .with_context(|| format!("Failed to encode {} event", event.event_type))?;
        out.push_str(&format!("event: {}\ndata: {}\n\n", event.event_type, data));
    }
    Ok(out)
}

pub fn write(path: &Path, events: &[RawEvent]) -> Result<()> {
    let text = encode(events)?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write transcript: {}", path.display()))
}
