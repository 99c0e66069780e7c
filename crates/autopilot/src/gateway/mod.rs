//! Provider Gateway
//!
//! Thin HTTP wrappers around the external LLM providers and the tool-integration
//! platform. Every call is normalized to a `GatewayResponse` so callers only ever
//! branch on a success flag.

mod composio;
mod gemini;
mod http;
mod openai;
mod types;

pub use composio::ComposioClient;
pub use gemini::GeminiClient;
pub use http::HttpGateway;
pub use openai::OpenAIClient;
pub use types::{GatewayResponse, LlmProvider, ProviderError, ProviderGateway, ToolExecution};
