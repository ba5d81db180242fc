//! Decoder for the server-sent-events format used by chat-completion streams.
//!
//! Each event arrives as a `data: {...}` line holding one chunk object; the
//! stream ends with `data: [DONE]`. Network chunks can split lines (and
//! multi-byte characters) anywhere, so bytes are buffered until a full line
//! is available.

use serde::Deserialize;

use crate::GatewayError;

#[derive(Debug, Deserialize)]
struct ChunkEvent {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    #[serde(default)]
    message: String,
}

/// A decoded stream event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A non-empty piece of assistant text
    Delta(String),
    /// The provider signalled end of stream
    Done,
}

/// Incremental line decoder for an SSE body
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every event completed by them
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, GatewayError> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = parse_line(&String::from_utf8_lossy(&line))? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Flush a trailing line that was not newline-terminated
    pub fn finish(&mut self) -> Result<Vec<SseEvent>, GatewayError> {
        let rest = std::mem::take(&mut self.buffer);
        Ok(parse_line(&String::from_utf8_lossy(&rest))?
            .into_iter()
            .collect())
    }
}

fn parse_line(line: &str) -> Result<Option<SseEvent>, GatewayError> {
    let line = line.trim();

    // Blank separators, comments and non-data fields (event:, id:, retry:)
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };

    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }
    if data == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }

    let event: ChunkEvent = serde_json::from_str(data)
        .map_err(|e| GatewayError::MalformedResponse(format!("Invalid stream chunk: {}", e)))?;

    if let Some(error) = event.error {
        return Err(GatewayError::StreamFailed(error.message));
    }

    Ok(event
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|text| !text.is_empty())
        .map(SseEvent::Delta))
}
