//! Incremental SSE decoding.
//!
//! [`SseDecoder`] reassembles partial network chunks into discrete
//! [`StreamEvent`]s. The event sequence is identical no matter how the
//! transport fragmented the byte stream, and no malformed line is ever fatal:
//! lines that fail to parse are dropped so one corrupt delta cannot abort an
//! otherwise healthy stream.

use serde::Deserialize;

use crate::types::StreamEvent;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Stateful line reassembler for `data: <json>\n` streams.
///
/// Call [`process_chunk`](Self::process_chunk) once per received chunk and
/// [`flush`](Self::flush) once at stream end to parse any final unterminated
/// line.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and emit every complete line's event in FIFO order.
    ///
    /// If the buffer does not end with a newline after the append, the final
    /// segment is an incomplete line and is held back for the next chunk.
    pub fn process_chunk(&mut self, raw: &str, emit: &mut dyn FnMut(StreamEvent)) {
        if raw.is_empty() {
            return;
        }
        self.buffer.push_str(raw);

        let buf = std::mem::take(&mut self.buffer);
        let complete = match buf.rfind('\n') {
            Some(last_newline) => {
                let (head, tail) = buf.split_at(last_newline + 1);
                self.buffer = tail.to_string();
                head.to_string()
            }
            None => {
                self.buffer = buf;
                return;
            }
        };

        for line in complete.split('\n') {
            if let Some(event) = parse_line(line) {
                emit(event);
            }
        }
    }

    /// Parse whatever remains in the buffer as a single line, then clear it.
    pub fn flush(&mut self, emit: &mut dyn FnMut(StreamEvent)) {
        let rest = std::mem::take(&mut self.buffer);
        if let Some(event) = parse_line(&rest) {
            emit(event);
        }
    }

    #[cfg(test)]
    fn buffered(&self) -> &str {
        &self.buffer
    }
}

fn parse_line(line: &str) -> Option<StreamEvent> {
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();
    if payload.is_empty() {
        return None;
    }
    if payload == DONE_SENTINEL {
        return Some(StreamEvent::Done { message_id: None });
    }
    let parsed = parse_payload(payload);
    if parsed.is_none() {
        // Likely a line truncated mid-JSON upstream; skip and keep going.
        tracing::debug!(payload, "dropping unparseable stream line");
    }
    parsed
}

/// Unified event shape emitted by the gateway's own streams.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum TaggedWire {
    Chunk {
        content: String,
    },
    Done {
        #[serde(default, rename = "messageId")]
        message_id: Option<String>,
    },
    Error {
        message: String,
    },
    Title {
        title: String,
    },
}

/// OpenAI-compatible delta shape produced by both provider backends.
#[derive(Deserialize)]
struct CompletionWire {
    #[serde(default)]
    id: Option<String>,
    choices: Vec<ChoiceWire>,
}

#[derive(Deserialize)]
struct ChoiceWire {
    #[serde(default)]
    delta: Option<DeltaWire>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct DeltaWire {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWire {
    error: ErrorBodyWire,
}

#[derive(Deserialize)]
struct ErrorBodyWire {
    message: String,
}

fn parse_payload(payload: &str) -> Option<StreamEvent> {
    if let Ok(tagged) = serde_json::from_str::<TaggedWire>(payload) {
        return Some(match tagged {
            TaggedWire::Chunk { content } => StreamEvent::Chunk { content },
            TaggedWire::Done { message_id } => StreamEvent::Done { message_id },
            TaggedWire::Error { message } => StreamEvent::Error { message },
            TaggedWire::Title { title } => StreamEvent::Title { title },
        });
    }

    if let Ok(err) = serde_json::from_str::<ErrorWire>(payload) {
        return Some(StreamEvent::Error {
            message: err.error.message,
        });
    }

    if let Ok(chunk) = serde_json::from_str::<CompletionWire>(payload) {
        for choice in &chunk.choices {
            if let Some(content) = choice.delta.as_ref().and_then(|d| d.content.as_deref())
                && !content.is_empty()
            {
                return Some(StreamEvent::Chunk {
                    content: content.to_string(),
                });
            }
            if choice.finish_reason.is_some() {
                return Some(StreamEvent::Done {
                    message_id: chunk.id.clone(),
                });
            }
        }
    }

    None
}

/// Incremental bytes-to-text decoder.
///
/// Holds back an incomplete trailing UTF-8 sequence so a multi-byte character
/// split across network chunks is reassembled instead of mangled. Keeps the
/// SSE decoder itself agnostic to byte-level fragmentation.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                let out = text.to_string();
                self.pending.clear();
                out
            }
            Err(err) if err.error_len().is_none() => {
                // Incomplete sequence at the tail; keep it for the next chunk.
                let valid = err.valid_up_to();
                let out = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
                self.pending.drain(..valid);
                out
            }
            Err(_) => {
                // Genuinely invalid bytes: replace and move on.
                let out = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                out
            }
        }
    }

    /// Drain any held-back bytes at stream end, lossily.
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&rest).into_owned()
    }
}
