//! Gateway trait and common types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// LLM providers reachable through the gateway, in fallback priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Gemini,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::OpenAI => write!(f, "openai"),
            LlmProvider::Gemini => write!(f, "gemini"),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "gpt" => Ok(LlmProvider::OpenAI),
            "gemini" | "google" => Ok(LlmProvider::Gemini),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// Error type for provider calls
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Response parse error: {0}")]
    ParseError(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Rate limited by {0}")]
    RateLimited(String),
}

impl ProviderError {
    /// Missing configuration, as opposed to a failed call
    pub fn is_configuration(&self) -> bool {
        matches!(self, ProviderError::NotConfigured(_))
    }
}

/// Normalized `{success, data | error}` result of any gateway call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GatewayResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Text payload of an LLM response, if the call succeeded with a string body
    pub fn text(&self) -> Option<&str> {
        if !self.success {
            return None;
        }
        self.data.as_ref().and_then(|d| d.as_str())
    }

    pub fn into_result(self) -> Result<serde_json::Value, String> {
        if self.success {
            Ok(self.data.unwrap_or(serde_json::Value::Null))
        } else {
            Err(self
                .error
                .unwrap_or_else(|| "unknown provider error".to_string()))
        }
    }
}

impl From<Result<serde_json::Value, ProviderError>> for GatewayResponse {
    fn from(result: Result<serde_json::Value, ProviderError>) -> Self {
        match result {
            Ok(data) => GatewayResponse::ok(data),
            Err(err) => GatewayResponse::err(err.to_string()),
        }
    }
}

/// Tool-execution request for the integration platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecution {
    pub entity_id: String,
    pub action: String,
    pub params: serde_json::Value,
}

/// Seam between the orchestrator and the outside world
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Whether an LLM provider has configuration
    fn is_available(&self, provider: LlmProvider) -> bool;

    /// Whether the tool-integration platform has configuration
    fn tools_available(&self) -> bool;

    /// Send a prompt to an LLM provider; `data` is the reply text on success
    async fn complete(&self, provider: LlmProvider, prompt: &str) -> GatewayResponse;

    /// Execute an action on the tool-integration platform
    async fn execute_tool(&self, request: &ToolExecution) -> GatewayResponse;
}
