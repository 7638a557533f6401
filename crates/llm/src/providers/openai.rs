//! OpenAI-compatible completions provider.
//!
//! Targets the legacy `/v1/completions` endpoint, which is what self-hosted
//! servers (vLLM, llama.cpp server, text-generation-inference) expose for
//! instruction-tuned Mistral models. Requests set `echo: true`, so the
//! returned text starts with the prompt.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use measles_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default endpoint for a locally hosted OpenAI-compatible server.
pub const DEFAULT_OPENAI_URL: &str = "http://localhost:8000/v1";

const REQUEST_TIMEOUT_SECS: u64 = 300;

const HEALTH_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    prompt: String,
    echo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: String,
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Client for OpenAI-compatible text completion servers.
pub struct OpenAiClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client for `base_url` (including the `/v1` prefix).
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    fn to_completion_request(&self, request: &LlmRequest) -> CompletionRequest {
        CompletionRequest {
            model: request.model.clone(),
            prompt: request.prompt.clone(),
            echo: true,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            // OpenAI has no multiplicative repetition penalty; map the excess onto
            // the additive frequency penalty.
            frequency_penalty: request.repeat_penalty.map(|p| (p - 1.0).clamp(0.0, 2.0)),
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn echoes_prompt(&self) -> bool {
        true
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!("Sending completion request to {}", self.base_url);

        let url = format!("{}/completions", self.base_url);
        let body = self.to_completion_request(request);

        let response = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Generation(format!("Failed to send completion request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Generation(format!(
                "Completion API error ({}): {}",
                status, error_text
            )));
        }

        let parsed: CompletionResponse = response.json().await.map_err(|e| {
            AppError::Generation(format!("Failed to parse completion response: {}", e))
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Generation("Completion response had no choices".to_string()))?;

        let usage = parsed
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(LlmResponse {
            content: choice.text,
            model: if parsed.model.is_empty() {
                request.model.clone()
            } else {
                parsed.model
            },
            usage,
        })
    }

    async fn health_check(&self) -> AppResult<bool> {
        let url = format!("{}/models", self.base_url);
        let result = self
            .authorized(self.client.get(&url))
            .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
            .send()
            .await;

        match result {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::debug!("Completion server not reachable at {}: {}", self.base_url, e);
                Ok(false)
            }
        }
    }
}
