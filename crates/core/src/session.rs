//! Session state for one orchestration run.
//!
//! An [`AgentSession`] is owned and mutated by exactly one agent loop. Every
//! outside reader gets a clone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::AgentMessage;

/// Approval classification of a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalTier {
    /// Always allowed
    Auto,
    /// Allowed automatically only with `auto_approve_writes`
    Batch,
    /// Allowed automatically only with `auto_approve_exec`
    Individual,
}

impl std::fmt::Display for ApprovalTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Auto => "auto",
            Self::Batch => "batch",
            Self::Individual => "individual",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// A tool call waiting for a human decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingApproval {
    pub tool_call_id: String,
    /// LLM-facing tool name
    pub tool_name: String,
    pub capability: String,
    pub arguments: serde_json::Value,
    pub tier: ApprovalTier,
    pub status: ApprovalStatus,
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Running,
    WaitingApproval,
    Complete,
    Error,
    Cancelled,
}

/// The root aggregate of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSession {
    pub id: String,
    pub workspace_id: String,
    pub task: String,
    /// Append-only transcript
    pub messages: Vec<AgentMessage>,
    pub status: SessionStatus,
    pub current_step: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_approvals: Vec<PendingApproval>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentSession {
    /// Create an idle session seeded with the system prompt and the task.
    pub fn new(
        workspace_id: impl Into<String>,
        task: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        let task = task.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            workspace_id: workspace_id.into(),
            messages: vec![
                AgentMessage::system(system_prompt),
                AgentMessage::user(task.clone()),
            ],
            task,
            status: SessionStatus::Idle,
            current_step: 0,
            pending_approvals: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message and bump `updated_at`.
    pub fn push(&mut self, message: AgentMessage) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    pub fn set_status(&mut self, status: SessionStatus) {
        self.updated_at = Utc::now();
        self.status = status;
    }

    /// Set every still-pending entry whose id is in `ids` to `status`.
    ///
    /// Returns how many entries changed; already-resolved entries are left
    /// alone.
    pub fn resolve_pending(&mut self, ids: &[String], status: ApprovalStatus) -> usize {
        let mut changed = 0;
        for approval in &mut self.pending_approvals {
            if approval.status == ApprovalStatus::Pending && ids.contains(&approval.tool_call_id) {
                approval.status = status;
                changed += 1;
            }
        }
        if changed > 0 {
            self.updated_at = Utc::now();
        }
        changed
    }

    /// True once no entry is still `pending`.
    pub fn approvals_resolved(&self) -> bool {
        self.pending_approvals
            .iter()
            .all(|a| a.status != ApprovalStatus::Pending)
    }

    /// Content of the most recent assistant message.
    pub fn last_response(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|m| match m {
            AgentMessage::Assistant { content, .. } => Some(content.as_str()),
            _ => None,
        })
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Complete,
    MaxStepsReached,
    Cancelled,
    Error,
}

/// Outcome of `AgentLoop::run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRunResult {
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    pub steps_completed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    fn pending(id: &str) -> PendingApproval {
        PendingApproval {
            tool_call_id: id.into(),
            tool_name: "fs_write".into(),
            capability: "fs.write".into(),
            arguments: serde_json::json!({}),
            tier: ApprovalTier::Batch,
            status: ApprovalStatus::Pending,
        }
    }

    #[test]
    fn new_session_is_seeded() {
        let session = AgentSession::new("ws-1", "Add a README", "You are a coding agent.");
        assert_eq!(session.status, SessionStatus::Idle);
        assert_eq!(session.current_step, 0);
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role(), Role::System);
        assert_eq!(session.messages[1].content(), "Add a README");
    }

    #[test]
    fn push_tracks_updates() {
        let mut session = AgentSession::new("ws", "task", "sys");
        let before = session.updated_at;
        session.push(AgentMessage::assistant("ok"));
        assert!(session.updated_at >= before);
        assert_eq!(session.last_response(), Some("ok"));
    }

    #[test]
    fn resolving_twice_is_a_noop() {
        let mut session = AgentSession::new("ws", "task", "sys");
        session.pending_approvals = vec![pending("a"), pending("b")];

        assert_eq!(session.resolve_pending(&["a".into()], ApprovalStatus::Approved), 1);
        assert_eq!(session.resolve_pending(&["a".into()], ApprovalStatus::Rejected), 0);
        assert_eq!(session.pending_approvals[0].status, ApprovalStatus::Approved);
        assert!(!session.approvals_resolved());

        assert_eq!(session.resolve_pending(&["b".into(), "zzz".into()], ApprovalStatus::Rejected), 1);
        assert!(session.approvals_resolved());
    }

    #[test]
    fn set_status_bumps_updated_at() {
        let mut session = AgentSession::new("ws", "task", "sys");
        let before = session.updated_at;
        session.set_status(SessionStatus::Running);
        assert_eq!(session.status, SessionStatus::Running);
        assert!(session.updated_at >= before);
    }

    #[test]
    fn run_status_wire_names() {
        let json = serde_json::to_string(&RunStatus::MaxStepsReached).unwrap();
        assert_eq!(json, r#""max_steps_reached""#);
        assert_eq!(ApprovalTier::Individual.to_string(), "individual");
    }
}
