//! HTTP-backed gateway

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{
    composio::ComposioClient,
    gemini::GeminiClient,
    openai::OpenAIClient,
    types::{GatewayResponse, LlmProvider, ProviderError, ProviderGateway, ToolExecution},
};
use crate::config::AutopilotConfig;

/// Gateway whose provider availability is fixed at construction
pub struct HttpGateway {
    openai: Option<OpenAIClient>,
    gemini: Option<GeminiClient>,
    composio: Option<ComposioClient>,
}

impl HttpGateway {
    pub fn new(config: &AutopilotConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.execution.request_timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("[GATEWAY] Falling back to default HTTP client: {}", e);
                Client::new()
            });

        let gateway = Self {
            openai: config
                .openai
                .clone()
                .map(|c| OpenAIClient::new(client.clone(), c)),
            gemini: config
                .gemini
                .clone()
                .map(|c| GeminiClient::new(client.clone(), c)),
            composio: config
                .composio
                .clone()
                .map(|c| ComposioClient::new(client, c)),
        };

        tracing::info!(
            "[GATEWAY] Initialized: openai={}, gemini={}, tools={}",
            gateway.openai.is_some(),
            gateway.gemini.is_some(),
            gateway.composio.is_some()
        );

        gateway
    }
}

#[async_trait]
impl ProviderGateway for HttpGateway {
    fn is_available(&self, provider: LlmProvider) -> bool {
        match provider {
            LlmProvider::OpenAI => self.openai.is_some(),
            LlmProvider::Gemini => self.gemini.is_some(),
        }
    }

    fn tools_available(&self) -> bool {
        self.composio.is_some()
    }

    async fn complete(&self, provider: LlmProvider, prompt: &str) -> GatewayResponse {
        let result = match provider {
            LlmProvider::OpenAI => match &self.openai {
                Some(client) => client.chat(prompt).await,
                None => Err(ProviderError::NotConfigured("openai".to_string())),
            },
            LlmProvider::Gemini => match &self.gemini {
                Some(client) => client.generate(prompt).await,
                None => Err(ProviderError::NotConfigured("gemini".to_string())),
            },
        };

        if let Err(e) = &result {
            tracing::debug!("[GATEWAY] {} call failed: {}", provider, e);
        }

        result.map(serde_json::Value::String).into()
    }

    async fn execute_tool(&self, request: &ToolExecution) -> GatewayResponse {
        match &self.composio {
            Some(client) => client.execute(request).await.into(),
            None => GatewayResponse::err(
                ProviderError::NotConfigured("tool platform".to_string()).to_string(),
            ),
        }
    }
}
