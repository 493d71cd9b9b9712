//! Agent settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for one agent session. Fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Model sent with every chat-completion request
    #[serde(default = "default_model")]
    pub model: String,

    /// Step budget (safety limit)
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Auto-approve `batch` tier capabilities (filesystem/git writes)
    #[serde(default)]
    pub auto_approve_writes: bool,

    /// Auto-approve `individual` tier capabilities (command execution)
    #[serde(default)]
    pub auto_approve_exec: bool,

    /// Fallback tick while waiting for approvals
    #[serde(default = "default_poll_interval_ms")]
    pub approval_poll_interval_ms: u64,

    /// Replaces the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_max_steps() -> u32 {
    20
}
fn default_poll_interval_ms() -> u64 {
    250
}

impl AgentSettings {
    /// Overlay caller-supplied overrides on top of these settings.
    pub fn merge(mut self, overrides: AgentSettingsOverrides) -> Self {
        if let Some(model) = overrides.model {
            self.model = model;
        }
        if let Some(max_steps) = overrides.max_steps {
            self.max_steps = max_steps;
        }
        if let Some(writes) = overrides.auto_approve_writes {
            self.auto_approve_writes = writes;
        }
        if let Some(exec) = overrides.auto_approve_exec {
            self.auto_approve_exec = exec;
        }
        if let Some(ms) = overrides.approval_poll_interval_ms {
            self.approval_poll_interval_ms = ms;
        }
        if overrides.system_prompt.is_some() {
            self.system_prompt = overrides.system_prompt;
        }
        self
    }

    pub fn approval_poll_interval(&self) -> Duration {
        Duration::from_millis(self.approval_poll_interval_ms.max(1))
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_steps: default_max_steps(),
            auto_approve_writes: false,
            auto_approve_exec: false,
            approval_poll_interval_ms: default_poll_interval_ms(),
            system_prompt: None,
        }
    }
}

/// Partial settings supplied by a caller; `None` keeps the base value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSettingsOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_approve_writes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_approve_exec: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_poll_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}
