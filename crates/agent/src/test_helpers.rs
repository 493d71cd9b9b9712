//! Shared test helpers: a scripted streaming provider and a recording executor.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tldw_agent_core::error::{ProviderError, ToolError};
use tldw_agent_core::provider::{ChatRequest, ChunkReceiver, Provider, StreamChunk, ToolCallDelta};
use tldw_agent_core::tool::ToolExecutor;
use tokio::sync::mpsc;

/// One scripted LLM turn.
pub enum Turn {
    /// Chunks delivered in order, then the stream closes.
    Chunks(Vec<StreamChunk>),
    /// Chunks delivered, then a mid-stream failure.
    FailAfter(Vec<StreamChunk>, ProviderError),
    /// Chunks delivered, then the stream stays open forever.
    Hang(Vec<StreamChunk>),
}

/// A provider that replays scripted turns, one per `stream` call.
///
/// With `repeat_last`, the final turn is replayed once the script runs out.
pub struct ScriptedProvider {
    turns: Mutex<Vec<Turn>>,
    repeat_last: Option<Vec<StreamChunk>>,
    requests: Mutex<Vec<ChatRequest>>,
    // Keeps hung streams open.
    parked: Mutex<Vec<mpsc::Sender<Result<StreamChunk, ProviderError>>>>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            turns: Mutex::new(turns.into_iter().rev().collect()),
            repeat_last: None,
            requests: Mutex::new(Vec::new()),
            parked: Mutex::new(Vec::new()),
        }
    }

    /// Plain chunk scripts, one per turn.
    pub fn scripted(turns: Vec<Vec<StreamChunk>>) -> Self {
        Self::new(turns.into_iter().map(Turn::Chunks).collect())
    }

    /// Replays the same turn for every call.
    pub fn always(chunks: Vec<StreamChunk>) -> Self {
        let mut provider = Self::new(Vec::new());
        provider.repeat_last = Some(chunks);
        provider
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: ChatRequest) -> Result<ChunkReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);

        let turn = match self.turns.lock().unwrap().pop() {
            Some(turn) => turn,
            None => match &self.repeat_last {
                Some(chunks) => Turn::Chunks(chunks.clone()),
                None => {
                    return Err(ProviderError::NotConfigured(
                        "scripted provider ran out of turns".into(),
                    ));
                }
            },
        };

        let (chunks, tail) = match turn {
            Turn::Chunks(c) => (c, None),
            Turn::FailAfter(c, e) => (c, Some(Err(e))),
            Turn::Hang(c) => (c, Some(Ok(()))),
        };

        let (tx, rx) = mpsc::channel(chunks.len() + 2);
        for chunk in chunks {
            tx.try_send(Ok(chunk)).unwrap();
        }
        match tail {
            Some(Err(e)) => tx.try_send(Err(e)).unwrap(),
            Some(Ok(())) => self.parked.lock().unwrap().push(tx),
            None => {}
        }
        Ok(rx)
    }
}

/// An executor that records every call and answers from a canned table.
pub struct RecordingExecutor {
    calls: Mutex<Vec<(String, serde_json::Value)>>,
    results: HashMap<String, Result<serde_json::Value, ToolError>>,
}

impl RecordingExecutor {
    /// Every capability answers `{"ok": true, "data": "x"}`.
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            results: HashMap::new(),
        }
    }

    pub fn with_result(mut self, capability: &str, result: serde_json::Value) -> Self {
        self.results.insert(capability.to_string(), Ok(result));
        self
    }

    pub fn with_failure(mut self, capability: &str, reason: &str) -> Self {
        self.results.insert(
            capability.to_string(),
            Err(ToolError::ExecutionFailed {
                capability: capability.to_string(),
                reason: reason.to_string(),
            }),
        );
        self
    }

    pub fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn capabilities(&self) -> Vec<String> {
        self.calls().into_iter().map(|(c, _)| c).collect()
    }
}

#[async_trait]
impl ToolExecutor for RecordingExecutor {
    async fn execute(
        &self,
        capability: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        self.calls
            .lock()
            .unwrap()
            .push((capability.to_string(), arguments));
        self.results
            .get(capability)
            .cloned()
            .unwrap_or_else(|| Ok(serde_json::json!({"ok": true, "data": "x"})))
    }
}

/// A turn that streams `text` in two pieces and calls no tools.
pub fn text_turn(text: &str) -> Vec<StreamChunk> {
    let mid = text
        .char_indices()
        .nth(text.chars().count() / 2)
        .map(|(i, _)| i)
        .unwrap_or(0);
    [&text[..mid], &text[mid..]]
        .into_iter()
        .filter(|s| !s.is_empty())
        .map(StreamChunk::text)
        .collect()
}

/// A turn that calls each `(id, name, arguments)` in order.
///
/// Each call is split across three deltas: id + first half of the name,
/// rest of the name, then the arguments.
pub fn tool_turn(calls: &[(&str, &str, &str)]) -> Vec<StreamChunk> {
    let mut chunks = Vec::new();
    for (index, (id, name, arguments)) in calls.iter().enumerate() {
        let (head, tail) = name.split_at(name.len() / 2);
        chunks.push(StreamChunk::tool_delta(ToolCallDelta {
            index,
            id: Some(id.to_string()),
            name: Some(head.to_string()),
            arguments: None,
        }));
        chunks.push(StreamChunk::tool_delta(ToolCallDelta {
            index,
            id: None,
            name: Some(tail.to_string()),
            arguments: None,
        }));
        chunks.push(StreamChunk::tool_delta(ToolCallDelta {
            index,
            id: None,
            name: None,
            arguments: Some(arguments.to_string()),
        }));
    }
    chunks
}
