//! Agent events: the observer side channel of a running loop.
//!
//! Events are delivered one at a time, in order, synchronously with the
//! loop. A sink that panics never takes the loop down with it.

use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use tokio::sync::mpsc;
use tracing::warn;

use crate::message::ToolCall;
use crate::session::{AgentRunResult, PendingApproval};

/// Events emitted by the agent loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A new step began.
    StepStart { step: u32 },

    /// The chat-completion request is about to be sent.
    LlmStart { step: u32 },

    /// Partial text from the model.
    LlmChunk { content: String },

    /// The model finished its turn.
    LlmComplete {
        content: String,
        tool_calls: Vec<ToolCall>,
    },

    /// Tool calls are waiting for a human decision.
    ApprovalNeeded { approvals: Vec<PendingApproval> },

    /// A tool is about to run.
    ToolStart {
        tool_call_id: String,
        name: String,
        capability: String,
        arguments: serde_json::Value,
    },

    /// A tool finished (successfully or not).
    ToolComplete {
        tool_call_id: String,
        name: String,
        result: serde_json::Value,
    },

    /// The run ended without a stream/network failure.
    Complete { result: AgentRunResult },

    /// The run failed.
    Error { message: String },
}

impl AgentEvent {
    /// Wire name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StepStart { .. } => "step_start",
            Self::LlmStart { .. } => "llm_start",
            Self::LlmChunk { .. } => "llm_chunk",
            Self::LlmComplete { .. } => "llm_complete",
            Self::ApprovalNeeded { .. } => "approval_needed",
            Self::ToolStart { .. } => "tool_start",
            Self::ToolComplete { .. } => "tool_complete",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }
}

/// Receives agent events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &AgentEvent);
}

impl<F> EventSink for F
where
    F: Fn(&AgentEvent) + Send + Sync,
{
    fn emit(&self, event: &AgentEvent) {
        self(event)
    }
}

/// Forwards events into a channel the caller drains.
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<AgentEvent>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AgentEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &AgentEvent) {
        // Receiver gone = nobody listening, that's fine
        let _ = self.sender.send(event.clone());
    }
}

/// Discards every event.
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: &AgentEvent) {}
}

/// Deliver `event` to `sink`, containing any panic the sink raises.
pub fn deliver(sink: &dyn EventSink, event: &AgentEvent) {
    if catch_unwind(AssertUnwindSafe(|| sink.emit(event))).is_err() {
        warn!(event = event.event_type(), "Event sink panicked; event dropped");
    }
}
