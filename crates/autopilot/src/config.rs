//! Runtime configuration
//!
//! Built once at process start and shared by `Arc` with the gateway, the fallback
//! executor and the session. Business logic never reads the environment directly.

use std::path::Path;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{AutopilotError, Result};

/// Whether goal runs talk to real providers or synthesize demo results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Live,
    Demo,
}

impl ExecutionMode {
    pub fn is_live(self) -> bool {
        matches!(self, ExecutionMode::Live)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenAIConfig {
    pub api_key: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_openai_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    800
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: default_openai_model(),
            endpoint: default_openai_endpoint(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiConfig {
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_gemini_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: default_gemini_model(),
            endpoint: default_gemini_endpoint(),
            temperature: default_temperature(),
        }
    }
}

/// Tool-integration platform (Composio) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposioConfig {
    pub api_key: String,
    #[serde(default = "default_composio_endpoint")]
    pub endpoint: String,
}

fn default_composio_endpoint() -> String {
    "https://backend.composio.dev/api/v2".to_string()
}

impl ComposioConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: default_composio_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSettings {
    /// Force demo mode even when providers are configured
    #[serde(default)]
    pub demo_mode: bool,
    /// Pacing delay inserted after each phase
    #[serde(default = "default_phase_delay_ms")]
    pub phase_delay_ms: u64,
    #[serde(default = "default_entity_id")]
    pub entity_id: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_phase_delay_ms() -> u64 {
    800
}

fn default_entity_id() -> String {
    "default".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            demo_mode: false,
            phase_delay_ms: default_phase_delay_ms(),
            entity_id: default_entity_id(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Fixed confidence reported for each provider tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceConfig {
    #[serde(default = "default_primary_confidence")]
    pub primary: f32,
    #[serde(default = "default_secondary_confidence")]
    pub secondary: f32,
    #[serde(default = "default_demo_confidence")]
    pub demo: f32,
}

fn default_primary_confidence() -> f32 {
    0.95
}

fn default_secondary_confidence() -> f32 {
    0.9
}

fn default_demo_confidence() -> f32 {
    0.8
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            primary: default_primary_confidence(),
            secondary: default_secondary_confidence(),
            demo: default_demo_confidence(),
        }
    }
}

/// Core configuration for Autopilot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutopilotConfig {
    #[serde(default)]
    pub openai: Option<OpenAIConfig>,
    #[serde(default)]
    pub gemini: Option<GeminiConfig>,
    #[serde(default)]
    pub composio: Option<ComposioConfig>,
    #[serde(default)]
    pub execution: ExecutionSettings,
    #[serde(default)]
    pub confidence: ConfidenceConfig,
}

impl AutopilotConfig {
    /// Configuration with no providers; every run is synthesized.
    pub fn demo() -> Self {
        Self::default()
    }

    /// Build from process environment variables.
    pub fn from_env() -> Self {
        let openai = env_non_empty("OPENAI_API_KEY").map(|key| {
            let mut config = OpenAIConfig::new(key);
            if let Some(model) = env_non_empty("OPENAI_MODEL") {
                config.model = model;
            }
            if let Some(endpoint) = env_non_empty("OPENAI_ENDPOINT") {
                config.endpoint = endpoint;
            }
            config
        });

        let gemini = env_non_empty("GEMINI_API_KEY").map(|key| {
            let mut config = GeminiConfig::new(key);
            if let Some(model) = env_non_empty("GEMINI_MODEL") {
                config.model = model;
            }
            config
        });

        let composio = env_non_empty("COMPOSIO_API_KEY").map(ComposioConfig::new);

        let mut execution = ExecutionSettings::default();
        if let Some(flag) = env_non_empty("AUTOPILOT_DEMO_MODE") {
            execution.demo_mode = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(delay) = env_non_empty("AUTOPILOT_PHASE_DELAY_MS").and_then(|v| v.parse().ok())
        {
            execution.phase_delay_ms = delay;
        }
        if let Some(entity) = env_non_empty("COMPOSIO_ENTITY_ID") {
            execution.entity_id = entity;
        }

        let config = Self {
            openai,
            gemini,
            composio,
            execution,
            confidence: ConfidenceConfig::default(),
        };

        tracing::info!(
            "Autopilot configured: mode={:?}, openai={}, gemini={}, composio={}",
            config.mode(),
            config.openai.is_some(),
            config.gemini.is_some(),
            config.composio.is_some()
        );

        config
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| AutopilotError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AutopilotError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn with_phase_delay_ms(mut self, delay: u64) -> Self {
        self.execution.phase_delay_ms = delay;
        self
    }

    pub fn has_llm_provider(&self) -> bool {
        self.openai.is_some() || self.gemini.is_some()
    }

    pub fn mode(&self) -> ExecutionMode {
        if !self.execution.demo_mode && self.has_llm_provider() {
            ExecutionMode::Live
        } else {
            ExecutionMode::Demo
        }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
