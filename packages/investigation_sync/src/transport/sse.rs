//! Incremental Server-Sent Events decoder.
//!
//! Bytes arrive in arbitrary chunks; the decoder buffers partial lines and
//! emits one [`WireMessage`] per blank-line-terminated event block.
//!
//! Line endings: `\n`, `\r\n` or `\r`, including a `\r\n` split across two
//! chunks. Lines starting with `:` are comments. An event still open when the
//! stream ends is discarded, and so is an event larger than
//! [`MAX_EVENT_SIZE`].

use tracing::debug;

use super::WireMessage;

/// Upper bound on the buffered line plus data of one event.
pub const MAX_EVENT_SIZE: usize = 1024 * 1024;

const DEFAULT_EVENT: &str = "message";
const BOM: &str = "\u{feff}";

#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    /// Last byte was `\r`; a following `\n` belongs to the same terminator.
    after_cr: bool,
    started: bool,
    event: Option<String>,
    data: String,
    id: Option<String>,
    retry: Option<u64>,
    /// Skipping the rest of an oversized event up to its blank line.
    discarding: bool,
    /// Bytes of the current line were skipped while discarding.
    line_skipped: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of the response body, returning every event it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<WireMessage> {
        let mut out = Vec::new();
        for &byte in chunk {
            if self.after_cr {
                self.after_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\n' => self.end_line(&mut out),
                b'\r' => {
                    self.end_line(&mut out);
                    self.after_cr = true;
                }
                _ => self.push_byte(byte),
            }
        }
        out
    }

    fn push_byte(&mut self, byte: u8) {
        if self.discarding {
            self.line_skipped = true;
            return;
        }
        if self.line.len() + self.data.len() >= MAX_EVENT_SIZE {
            debug!(limit = MAX_EVENT_SIZE, "event exceeds size limit, discarding");
            self.line = Vec::new();
            self.data = String::new();
            self.event = None;
            self.discarding = true;
            self.line_skipped = true;
            return;
        }
        self.line.push(byte);
    }

    fn end_line(&mut self, out: &mut Vec<WireMessage>) {
        if self.discarding {
            // Only a truly blank line closes the dropped event.
            if !std::mem::take(&mut self.line_skipped) {
                self.discarding = false;
            }
            return;
        }

        let bytes = std::mem::take(&mut self.line);
        let decoded = String::from_utf8_lossy(&bytes);
        let mut line: &str = &decoded;
        if !self.started {
            self.started = true;
            line = line.strip_prefix(BOM).unwrap_or(line);
        }

        if line.is_empty() {
            if let Some(message) = self.dispatch() {
                out.push(message);
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" => {
                if !value.contains('\0') {
                    self.id = Some(value.to_string());
                }
            }
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(ms);
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<WireMessage> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }

        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }

        Some(WireMessage {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
            id: self.id.clone(),
            retry: self.retry,
        })
    }
}
