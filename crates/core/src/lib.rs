//! # tldw agent core
//!
//! Domain types, traits, and error definitions for the tldw agent tool-call
//! loop. This crate has **zero framework dependencies**; it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The two outbound seams (chat-completion streaming and tool execution) are
//! traits here. Implementations live in their respective crates. This enables:
//! - Swapping the backend via configuration
//! - Easy testing with scripted stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentSettings, AgentSettingsOverrides};
pub use error::{Error, ProviderError, Result, ToolError};
pub use event::{AgentEvent, ChannelSink, EventSink, NoopSink};
pub use message::{AgentMessage, Role, ToolCall};
pub use provider::{ChatRequest, ChunkReceiver, Provider, StreamChunk, ToolCallDelta};
pub use session::{
    AgentRunResult, AgentSession, ApprovalStatus, ApprovalTier, PendingApproval, RunStatus,
    SessionStatus,
};
pub use tool::{ToolDefinition, ToolExecutor};
