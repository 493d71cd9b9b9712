//! The agent tool-call loop.
//!
//! One [`AgentLoop`] drives one session through a **stream → dispatch →
//! repeat** cycle:
//!
//! 1. **Stream** a chat-completion turn with the full transcript and the tool
//!    catalog, forwarding text fragments as they arrive
//! 2. **Stop** if the model called no tools
//! 3. **Dispatch** the calls: read-only tools run at once, writes and command
//!    execution wait for a human unless settings say otherwise
//! 4. **Append** one tool message per call, in call order, and go again
//!
//! The loop ends when the model answers without tools, the step budget runs
//! out, the run is cancelled, or the stream fails. Every outcome is returned
//! as an [`AgentRunResult`](tldw_agent_core::AgentRunResult) and announced on
//! the event sink.

pub mod dispatcher;
pub mod llm;
pub mod loop_runner;
pub mod prompt;

#[cfg(test)]
mod test_helpers;

pub use dispatcher::{REJECTED_MESSAGE, failure_result, rejection_result};
pub use llm::{LlmTurn, ToolCallAccumulator, call_llm};
pub use loop_runner::{AgentHandle, AgentLoop};
pub use prompt::default_system_prompt;
