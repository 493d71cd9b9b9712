//! Server-sent-event framing and chat-completion delta parsing.
//!
//! Bytes arrive in arbitrary slices. [`SseLineBuffer`] turns them into whole
//! lines, and [`parse_line`] turns a `data:` line into a [`StreamChunk`] or
//! the `[DONE]` sentinel. Anything else (comments, keep-alives, `event:`
//! fields, JSON that does not parse) is skipped.

use serde::Deserialize;
use tldw_agent_core::provider::{StreamChunk, ToolCallDelta};
use tracing::trace;

/// Accumulates raw bytes and yields complete lines.
///
/// Lines are split on `\n` at the byte level so a multi-byte character cut
/// across two network reads is reassembled before decoding.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and drain every complete line (without the terminator).
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Flush a trailing line left behind when the connection closed.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&raw).trim_end_matches('\r').to_string();
        Some(line)
    }
}

/// A meaningful SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Chunk(StreamChunk),
    Done,
}

/// Parse one SSE line.
pub fn parse_line(line: &str) -> Option<SseEvent> {
    let line = line.trim_end_matches('\r');

    // Skip empty lines and SSE comments
    if line.is_empty() || line.starts_with(':') {
        return None;
    }

    let data = line.strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }

    let response = match serde_json::from_str::<StreamResponse>(data) {
        Ok(r) => r,
        Err(e) => {
            trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
            return None;
        }
    };

    let choice = response.choices.into_iter().next()?;
    let content = choice.delta.content.filter(|c| !c.is_empty());
    let tool_calls: Vec<ToolCallDelta> = choice
        .delta
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(position, tc)| {
            let (name, arguments) = match tc.function {
                Some(f) => (f.name, f.arguments),
                None => (None, None),
            };
            ToolCallDelta {
                index: tc.index.unwrap_or(position),
                id: tc.id,
                name,
                arguments,
            }
        })
        .collect();

    if content.is_none() && tool_calls.is_empty() {
        return None;
    }

    Some(SseEvent::Chunk(StreamChunk {
        content,
        tool_calls,
    }))
}

// --- Wire types ---

/// A single `data: {...}` payload from a streaming chat completion.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta: arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}
