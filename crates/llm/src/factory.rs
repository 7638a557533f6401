//! LLM provider factory.
//!
//! Builds the text-completion client named in the application configuration.

use crate::client::LlmClient;
use crate::providers::{ollama, openai, OllamaClient, OpenAiClient};
use crate::types::ProviderType;
use measles_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "openai")
/// * `model` - Model the client is expected to serve
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - Optional API key (OpenAI-compatible servers only)
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown.
pub fn create_client(
    provider: &str,
    model: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    match ProviderType::parse(provider) {
        Some(ProviderType::Ollama) => {
            let base_url = endpoint.unwrap_or(ollama::DEFAULT_OLLAMA_URL);
            Ok(Arc::new(OllamaClient::with_base_url(base_url).with_model(model)))
        }
        Some(ProviderType::OpenAI) => {
            let base_url = endpoint.unwrap_or(openai::DEFAULT_OPENAI_URL);
            Ok(Arc::new(OpenAiClient::new(
                base_url,
                api_key.map(str::to_string),
            )))
        }
        None => Err(AppError::Config(format!(
            "Unknown provider: {}. Supported: ollama, openai",
            provider
        ))),
    }
}
