//! LLM driver: one streamed chat-completion turn.
//!
//! Content fragments are forwarded as `llm_chunk` events the moment they
//! arrive. Tool-call fragments are keyed by their per-turn index and
//! concatenated in arrival order; the finished calls are only known once the
//! stream ends.

use tldw_agent_core::error::{Error, Result};
use tldw_agent_core::event::{AgentEvent, EventSink, deliver};
use tldw_agent_core::message::ToolCall;
use tldw_agent_core::provider::{ChatRequest, Provider, ToolCallDelta};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Indices above this are treated as garbage rather than padded up to; the
/// fragment is dropped with a warning.
pub const MAX_TOOL_CALL_INDEX: usize = 127;

/// What the model produced in one turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmTurn {
    pub content: String,
    /// Empty when the model is done.
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Default, Clone)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Reassembles streamed tool-call fragments.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    slots: Vec<PartialCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fragment in. Indices may arrive out of order or with gaps.
    pub fn apply(&mut self, delta: &ToolCallDelta) {
        if delta.index > MAX_TOOL_CALL_INDEX {
            warn!(
                index = delta.index,
                max = MAX_TOOL_CALL_INDEX,
                "Dropping tool-call fragment with out-of-range index"
            );
            return;
        }
        if delta.index >= self.slots.len() {
            self.slots.resize_with(delta.index + 1, PartialCall::default);
        }

        let slot = &mut self.slots[delta.index];
        // The id is set once; later fragments repeat it or leave it empty.
        if let Some(id) = delta.id.as_deref() {
            if slot.id.is_empty() && !id.is_empty() {
                slot.id = id.to_string();
            }
        }
        if let Some(name) = delta.name.as_deref() {
            slot.name.push_str(name);
        }
        if let Some(arguments) = delta.arguments.as_deref() {
            slot.arguments.push_str(arguments);
        }
    }

    /// Finished calls in index order. Entries that never got a name are dropped.
    pub fn finish(self) -> Vec<ToolCall> {
        self.slots
            .into_iter()
            .filter(|slot| !slot.name.is_empty())
            .map(|slot| {
                let id = if slot.id.is_empty() {
                    format!("call_{}", Uuid::new_v4().simple())
                } else {
                    slot.id
                };
                ToolCall::new(id, slot.name, slot.arguments)
            })
            .collect()
    }
}

/// Stream one turn from `provider`.
///
/// Emits `llm_start` and one `llm_chunk` per content fragment. A cancel
/// while waiting on the stream drops it and returns [`Error::Cancelled`].
pub async fn call_llm(
    provider: &dyn Provider,
    request: ChatRequest,
    step: u32,
    cancel: &CancellationToken,
    sink: &dyn EventSink,
) -> Result<LlmTurn> {
    deliver(sink, &AgentEvent::LlmStart { step });
    debug!(
        provider = provider.name(),
        model = %request.model,
        step,
        messages = request.messages.len(),
        "Calling LLM"
    );

    let mut rx = tokio::select! {
        opened = provider.stream(request) => opened?,
        _ = cancel.cancelled() => return Err(Error::Cancelled),
    };

    let mut content = String::new();
    let mut calls = ToolCallAccumulator::new();

    loop {
        let next = tokio::select! {
            next = rx.recv() => next,
            _ = cancel.cancelled() => {
                debug!(step, "Cancelled mid-stream, dropping response");
                return Err(Error::Cancelled);
            }
        };

        // Sender dropped: [DONE] or connection closed
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk?;

        if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
            content.push_str(&text);
            deliver(sink, &AgentEvent::LlmChunk { content: text });
        }
        for delta in &chunk.tool_calls {
            calls.apply(delta);
        }
    }

    let tool_calls = calls.finish();
    debug!(step, chars = content.len(), tool_calls = tool_calls.len(), "LLM turn finished");

    Ok(LlmTurn {
        content,
        tool_calls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, Turn, text_turn, tool_turn};
    use std::sync::Mutex;
    use tldw_agent_core::error::ProviderError;
    use tldw_agent_core::event::NoopSink;
    use tldw_agent_core::message::AgentMessage;
    use tldw_agent_core::provider::StreamChunk;

    fn delta(index: usize, id: Option<&str>, name: Option<&str>, args: Option<&str>) -> ToolCallDelta {
        ToolCallDelta {
            index,
            id: id.map(String::from),
            name: name.map(String::from),
            arguments: args.map(String::from),
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "test-model".into(),
            messages: vec![AgentMessage::user("hi")],
            tools: vec![],
        }
    }

    /// Split `s` at byte offset `at`, nudged forward to a char boundary.
    fn split(s: &str, at: usize) -> (&str, &str) {
        let mut at = at.min(s.len());
        while !s.is_char_boundary(at) {
            at += 1;
        }
        s.split_at(at)
    }

    #[test]
    fn accumulates_single_call() {
        let mut acc = ToolCallAccumulator::new();
        acc.apply(&delta(0, Some("call_1"), Some("fs_"), Some("")));
        acc.apply(&delta(0, None, Some("read"), Some("{\"path\":")));
        acc.apply(&delta(0, None, None, Some("\"a.txt\"}")));
        let calls = acc.finish();
        assert_eq!(calls, vec![ToolCall::new("call_1", "fs_read", "{\"path\":\"a.txt\"}")]);
    }

    #[test]
    fn any_split_point_reassembles_identically() {
        let name = "search_grep";
        let args = r#"{"pattern":"fn main","path":"src/ü"}"#;
        let expected = vec![ToolCall::new("call_x", name, args)];

        for name_cut in 0..=name.len() {
            for args_cut in 0..=args.len() {
                let (n1, n2) = split(name, name_cut);
                let (a1, a2) = split(args, args_cut);
                let mut acc = ToolCallAccumulator::new();
                acc.apply(&delta(0, Some("call_x"), Some(n1), None));
                acc.apply(&delta(0, Some(""), Some(n2), Some(a1)));
                acc.apply(&delta(0, None, None, Some(a2)));
                assert_eq!(acc.finish(), expected, "name_cut={name_cut} args_cut={args_cut}");
            }
        }
    }

    #[test]
    fn interleaved_indices_stay_separate() {
        let mut acc = ToolCallAccumulator::new();
        acc.apply(&delta(0, Some("a"), Some("fs_"), None));
        acc.apply(&delta(1, Some("b"), Some("git_"), None));
        acc.apply(&delta(0, None, Some("read"), Some("{\"path\":\"x\"}")));
        acc.apply(&delta(1, None, Some("status"), Some("{}")));
        let calls = acc.finish();
        assert_eq!(
            calls,
            vec![
                ToolCall::new("a", "fs_read", "{\"path\":\"x\"}"),
                ToolCall::new("b", "git_status", "{}"),
            ]
        );
    }

    #[test]
    fn out_of_order_index_pads_and_keeps_order() {
        let mut acc = ToolCallAccumulator::new();
        acc.apply(&delta(2, Some("c"), Some("git_log"), Some("{}")));
        acc.apply(&delta(0, Some("a"), Some("fs_list"), Some("{}")));
        let calls = acc.finish();
        // Index 1 never got a name and is dropped
        let ids: Vec<&str> = calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn id_is_not_overwritten() {
        let mut acc = ToolCallAccumulator::new();
        acc.apply(&delta(0, Some("first"), Some("fs_read"), None));
        acc.apply(&delta(0, Some(""), None, None));
        acc.apply(&delta(0, Some("second"), None, Some("{}")));
        assert_eq!(acc.finish()[0].id, "first");
    }

    #[test]
    fn nameless_entries_are_discarded() {
        let mut acc = ToolCallAccumulator::new();
        acc.apply(&delta(0, Some("junk"), None, Some("{\"partial")));
        assert!(acc.finish().is_empty());
    }

    #[test]
    fn missing_id_gets_a_generated_one() {
        let mut acc = ToolCallAccumulator::new();
        acc.apply(&delta(0, None, Some("git_status"), Some("{}")));
        let calls = acc.finish();
        assert!(calls[0].id.starts_with("call_"));
        assert!(calls[0].id.len() > "call_".len());
    }

    #[test]
    fn absurd_index_is_ignored() {
        let mut acc = ToolCallAccumulator::new();
        acc.apply(&delta(1_000_000, Some("x"), Some("fs_read"), None));
        assert!(acc.finish().is_empty());
    }

    #[test]
    fn highest_allowed_index_is_kept_and_one_past_is_dropped() {
        let mut acc = ToolCallAccumulator::new();
        acc.apply(&delta(MAX_TOOL_CALL_INDEX, Some("last"), Some("fs_read"), Some("{}")));
        acc.apply(&delta(MAX_TOOL_CALL_INDEX + 1, Some("over"), Some("fs_write"), Some("{}")));
        let calls = acc.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "last");
        assert_eq!(calls[0].name, "fs_read");
    }

    #[tokio::test]
    async fn streams_text_and_emits_chunks() {
        let provider = ScriptedProvider::scripted(vec![text_turn("hello world")]);
        let seen = Mutex::new(Vec::new());
        let sink = |e: &AgentEvent| seen.lock().unwrap().push(e.clone());

        let turn = call_llm(&provider, request(), 1, &CancellationToken::new(), &sink)
            .await
            .unwrap();

        assert_eq!(turn.content, "hello world");
        assert!(turn.tool_calls.is_empty());

        let events = seen.into_inner().unwrap();
        assert_eq!(events[0], AgentEvent::LlmStart { step: 1 });
        let streamed: String = events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::LlmChunk { content } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(streamed, "hello world");
    }

    #[tokio::test]
    async fn streams_tool_calls() {
        let provider = ScriptedProvider::scripted(vec![tool_turn(&[
            ("call_1", "fs_read", r#"{"path":"a"}"#),
            ("call_2", "exec_run", r#"{"command":"cargo_test"}"#),
        ])]);
        let turn = call_llm(&provider, request(), 1, &CancellationToken::new(), &NoopSink)
            .await
            .unwrap();
        assert_eq!(turn.tool_calls.len(), 2);
        assert_eq!(turn.tool_calls[0].name, "fs_read");
        assert_eq!(turn.tool_calls[1].arguments, r#"{"command":"cargo_test"}"#);
        assert_eq!(provider.requests()[0].model, "test-model");
    }

    #[tokio::test]
    async fn empty_content_fragments_are_not_emitted() {
        let provider = ScriptedProvider::scripted(vec![vec![
            StreamChunk::text(""),
            StreamChunk::text("ok"),
        ]]);
        let count = Mutex::new(0);
        let sink = |e: &AgentEvent| {
            if matches!(e, AgentEvent::LlmChunk { .. }) {
                *count.lock().unwrap() += 1;
            }
        };
        call_llm(&provider, request(), 1, &CancellationToken::new(), &sink)
            .await
            .unwrap();
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn stream_error_propagates() {
        let provider = ScriptedProvider::new(vec![Turn::FailAfter(
            text_turn("partial"),
            ProviderError::StreamInterrupted("connection reset".into()),
        )]);
        let err = call_llm(&provider, request(), 1, &CancellationToken::new(), &NoopSink)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::StreamInterrupted(_))
        ));
    }

    #[tokio::test]
    async fn cancel_aborts_a_hung_stream() {
        let provider = ScriptedProvider::new(vec![Turn::Hang(text_turn("thinking"))]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = call_llm(&provider, request(), 1, &cancel, &NoopSink)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
