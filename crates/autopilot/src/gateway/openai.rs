//! OpenAI chat-completions client

use reqwest::Client;

use super::types::ProviderError;
use crate::config::OpenAIConfig;

const SYSTEM_PROMPT: &str = "You are an autonomous CRM operations agent. \
Respond with a JSON object containing `summary`, `businessImpact` and `nextActions` (an array of three short strings).";

pub struct OpenAIClient {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIClient {
    pub fn new(client: Client, config: OpenAIConfig) -> Self {
        Self { client, config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn build_payload(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt }
            ]
        })
    }

    fn parse_response(json: &serde_json::Value) -> Result<String, ProviderError> {
        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ProviderError::ParseError("OpenAI response had no content".to_string()))
    }

    pub async fn chat(&self, prompt: &str) -> Result<String, ProviderError> {
        if self.config.api_key.is_empty() {
            return Err(ProviderError::NotConfigured("OpenAI API key missing".to_string()));
        }

        tracing::debug!(
            "[GATEWAY] OpenAI request: model={}, prompt_chars={}",
            self.config.model,
            prompt.len()
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&self.build_payload(prompt))
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited("openai".to_string()));
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

        Self::parse_response(&json)
    }
}
