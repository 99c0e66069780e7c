//! In-memory gateway double for unit tests

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;

use crate::gateway::{GatewayResponse, LlmProvider, ProviderGateway, ToolExecution};

#[derive(Debug, Default)]
pub struct ScriptedGateway {
    llm: HashMap<LlmProvider, Result<String, String>>,
    tools: bool,
    failing_actions: HashSet<String>,
    llm_delay: Option<Duration>,
    tool_delay: Option<Duration>,
    llm_calls: Mutex<Vec<LlmProvider>>,
    tool_calls: Mutex<Vec<ToolExecution>>,
}

impl ScriptedGateway {
    /// No providers and no tool platform configured
    pub fn offline() -> Self {
        Self::default()
    }

    pub fn with_llm(mut self, provider: LlmProvider, reply: &str) -> Self {
        self.llm.insert(provider, Ok(reply.to_string()));
        self
    }

    /// Configured, but every call fails
    pub fn with_failing_llm(mut self, provider: LlmProvider, error: &str) -> Self {
        self.llm.insert(provider, Err(error.to_string()));
        self
    }

    pub fn with_tools(mut self) -> Self {
        self.tools = true;
        self
    }

    pub fn fail_tool(mut self, action: &str) -> Self {
        self.failing_actions.insert(action.to_string());
        self
    }

    pub fn with_llm_delay(mut self, delay: Duration) -> Self {
        self.llm_delay = Some(delay);
        self
    }

    pub fn with_tool_delay(mut self, delay: Duration) -> Self {
        self.tool_delay = Some(delay);
        self
    }

    pub fn llm_calls(&self) -> Vec<LlmProvider> {
        self.llm_calls.lock().unwrap().clone()
    }

    pub fn tool_calls(&self) -> Vec<ToolExecution> {
        self.tool_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderGateway for ScriptedGateway {
    fn is_available(&self, provider: LlmProvider) -> bool {
        self.llm.contains_key(&provider)
    }

    fn tools_available(&self) -> bool {
        self.tools
    }

    async fn complete(&self, provider: LlmProvider, _prompt: &str) -> GatewayResponse {
        self.llm_calls.lock().unwrap().push(provider);
        if let Some(delay) = self.llm_delay {
            tokio::time::sleep(delay).await;
        }
        match self.llm.get(&provider) {
            Some(Ok(reply)) => GatewayResponse::ok(serde_json::Value::String(reply.clone())),
            Some(Err(error)) => GatewayResponse::err(error.clone()),
            None => GatewayResponse::err(format!("Provider not configured: {}", provider)),
        }
    }

    async fn execute_tool(&self, request: &ToolExecution) -> GatewayResponse {
        self.tool_calls.lock().unwrap().push(request.clone());
        if let Some(delay) = self.tool_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_actions.contains(&request.action) {
            GatewayResponse::err(format!("{} failed", request.action))
        } else {
            GatewayResponse::ok(serde_json::json!({ "action": request.action, "id": "remote-1" }))
        }
    }
}
