//! HTTP bridge to the native tool collaborator.
//!
//! Each call is one POST of `{"tool": <capability>, "args": {...}}`. The
//! response body is returned as-is; concrete tool behaviour belongs to the
//! collaborator.

use async_trait::async_trait;
use std::time::Duration;
use tldw_agent_config::AppConfig;
use tldw_agent_core::error::ToolError;
use tldw_agent_core::tool::ToolExecutor;
use tracing::{debug, warn};

/// Executes capabilities by calling a remote endpoint.
pub struct RemoteToolExecutor {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl RemoteToolExecutor {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ToolError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into(),
            api_key,
            client,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ToolError> {
        Self::new(
            config.tools_endpoint(),
            config.server.api_key.clone(),
            Duration::from_secs(config.server.request_timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(capability: &str, arguments: serde_json::Value) -> serde_json::Value {
        serde_json::json!({ "tool": capability, "args": arguments })
    }
}

#[async_trait]
impl ToolExecutor for RemoteToolExecutor {
    async fn execute(
        &self,
        capability: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        debug!(capability, endpoint = %self.endpoint, "Executing remote tool");

        let mut builder = self
            .client
            .post(&self.endpoint)
            .json(&Self::request_body(capability, arguments));
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(capability, status = status.as_u16(), "Tool endpoint returned error");
            return Err(ToolError::ExecutionFailed {
                capability: capability.to_string(),
                reason: format!("HTTP {}: {body}", status.as_u16()),
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                capability: capability.to_string(),
                reason: format!("Invalid JSON result: {e}"),
            })
    }
}
