//! Embedding configuration.

use measles_core::AppConfig;
use serde::{Deserialize, Serialize};

/// Settings used to construct an embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram" or "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Base URL for HTTP providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            base_url: None,
        }
    }
}

impl EmbeddingConfig {
    /// Derive embedding settings from the application configuration.
    ///
    /// The completion endpoint doubles as the embedding endpoint when both
    /// are served by Ollama.
    pub fn from_app_config(config: &AppConfig) -> Self {
        let pipeline = &config.pipeline;
        let base_url = if pipeline.embedding_provider == "ollama" && config.provider == "ollama" {
            config.endpoint.clone()
        } else {
            None
        };

        Self {
            provider: pipeline.embedding_provider.clone(),
            model: pipeline.embedding_model.clone(),
            dimensions: pipeline.embedding_dimensions,
            base_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_app_config_defaults() {
        let config = AppConfig::default();
        let embedding = EmbeddingConfig::from_app_config(&config);
        assert_eq!(embedding, EmbeddingConfig::default());
    }

    #[test]
    fn test_ollama_endpoint_is_shared() {
        let mut config = AppConfig::default();
        config.endpoint = Some("http://gpu-box:11434".to_string());
        config.pipeline.embedding_provider = "ollama".to_string();
        config.pipeline.embedding_model = "nomic-embed-text".to_string();
        config.pipeline.embedding_dimensions = 768;

        let embedding = EmbeddingConfig::from_app_config(&config);
        assert_eq!(embedding.base_url.as_deref(), Some("http://gpu-box:11434"));
        assert_eq!(embedding.dimensions, 768);
    }
}
