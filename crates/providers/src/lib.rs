//! Chat-completion provider implementations for the tldw agent.
//!
//! All providers implement the `tldw_agent_core::Provider` trait. The SSE
//! framing and delta parsing live in [`sse`] so they can be exercised
//! without a network.

pub mod openai_compat;
pub mod sse;

pub use openai_compat::OpenAiCompatProvider;
pub use sse::{SseEvent, SseLineBuffer, parse_line};
