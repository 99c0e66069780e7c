//! Tool-integration platform client (Composio actions API)

use reqwest::Client;

use super::types::{ProviderError, ToolExecution};
use crate::config::ComposioConfig;

pub struct ComposioClient {
    client: Client,
    config: ComposioConfig,
}

impl ComposioClient {
    pub fn new(client: Client, config: ComposioConfig) -> Self {
        Self { client, config }
    }

    fn action_url(&self, action: &str) -> String {
        format!(
            "{}/actions/{}/execute",
            self.config.endpoint.trim_end_matches('/'),
            action
        )
    }

    fn build_payload(request: &ToolExecution) -> serde_json::Value {
        serde_json::json!({
            "entityId": request.entity_id,
            "input": request.params,
        })
    }

    fn parse_response(json: serde_json::Value) -> Result<serde_json::Value, ProviderError> {
        if json["successfull"].as_bool() == Some(false) || json["successful"].as_bool() == Some(false)
        {
            let message = json["error"]
                .as_str()
                .unwrap_or("action reported failure")
                .to_string();
            return Err(ProviderError::Api {
                status: 200,
                message,
            });
        }
        Ok(json.get("data").cloned().unwrap_or(json))
    }

    pub async fn execute(&self, request: &ToolExecution) -> Result<serde_json::Value, ProviderError> {
        if self.config.api_key.is_empty() {
            return Err(ProviderError::NotConfigured("Composio API key missing".to_string()));
        }

        tracing::debug!(
            "[GATEWAY] Tool action {} for entity {}",
            request.action,
            request.entity_id
        );

        let response = self
            .client
            .post(self.action_url(&request.action))
            .header("x-api-key", &self.config.api_key)
            .json(&Self::build_payload(request))
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited("composio".to_string()));
            }
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Self::parse_response(json)
    }
}
