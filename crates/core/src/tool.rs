//! Tool seams: definitions shown to the LLM and the executor that runs them.
//!
//! The agent never runs a tool itself. It hands a capability id and parsed
//! arguments to a [`ToolExecutor`] (the native tool collaborator) and feeds
//! whatever comes back to the model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// LLM-facing flat name (e.g. `fs_write`)
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Runs a capability on behalf of the agent.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute `capability` (e.g. `fs.write`) with the given arguments and
    /// return a JSON-serializable result.
    async fn execute(
        &self,
        capability: &str,
        arguments: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoExecutor;

    #[async_trait]
    impl ToolExecutor for EchoExecutor {
        async fn execute(
            &self,
            capability: &str,
            arguments: serde_json::Value,
        ) -> std::result::Result<serde_json::Value, ToolError> {
            Ok(serde_json::json!({ "ok": true, "capability": capability, "args": arguments }))
        }
    }

    #[tokio::test]
    async fn executor_is_object_safe() {
        let executor: Box<dyn ToolExecutor> = Box::new(EchoExecutor);
        let out = executor
            .execute("fs.read", serde_json::json!({ "path": "README.md" }))
            .await
            .unwrap();
        assert_eq!(out["capability"], "fs.read");
        assert_eq!(out["args"]["path"], "README.md");
    }

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "exec_run".into(),
            description: "Run an allowlisted command".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": { "command": { "type": "string" } },
                "required": ["command"]
            }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("exec_run"));
        assert!(json.contains("command"));
    }
}
