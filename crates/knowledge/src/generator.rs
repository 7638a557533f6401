//! Answer generation: one completion per prompt, with the answer cut out after the response marker.

use measles_core::{AppError, AppResult};
use measles_llm::{LlmClient, LlmRequest};
use serde::Serialize;
use std::sync::Arc;

/// Nucleus sampling used for guideline answers.
pub const DEFAULT_TOP_P: f32 = 0.9;

/// Repetition penalty used for guideline answers.
pub const DEFAULT_REPEAT_PENALTY: f32 = 1.1;

/// How the answer was obtained from the completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Extraction {
    /// Text after the last response marker
    MarkerFound,
    /// Marker missing; the completion is returned unchanged
    RawFallback,
}

/// A generated answer and how it was extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub extraction: Extraction,
}

/// Runs completions against a single model instance.
pub struct AnswerGenerator {
    client: Arc<dyn LlmClient>,
    model: String,
    response_marker: String,
    top_p: f32,
    repeat_penalty: f32,
}

impl AnswerGenerator {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        response_marker: impl Into<String>,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            response_marker: response_marker.into(),
            top_p: DEFAULT_TOP_P,
            repeat_penalty: DEFAULT_REPEAT_PENALTY,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn client(&self) -> &Arc<dyn LlmClient> {
        &self.client
    }

    /// Generate an answer for `prompt`.
    ///
    /// Rejects `max_new_tokens == 0` and negative or non-finite temperatures
    /// with `AppError::Config` before calling the model. Completion failures
    /// surface as `AppError::Generation`; there is no retry.
    pub async fn generate(
        &self,
        prompt: &str,
        max_new_tokens: u32,
        temperature: f32,
    ) -> AppResult<Generation> {
        if max_new_tokens == 0 {
            return Err(AppError::Config(
                "max_new_tokens must be greater than zero".to_string(),
            ));
        }
        if !temperature.is_finite() || temperature < 0.0 {
            return Err(AppError::Config(format!(
                "temperature must be a non-negative number, got {}",
                temperature
            )));
        }

        let request = LlmRequest::new(prompt, &self.model)
            .with_max_tokens(max_new_tokens)
            .with_temperature(temperature)
            .with_top_p(self.top_p)
            .with_repeat_penalty(self.repeat_penalty);

        tracing::debug!(
            "Generating with {} (max_new_tokens={}, temperature={})",
            self.client.provider_name(),
            max_new_tokens,
            temperature
        );

        let response = self.client.complete(&request).await.map_err(|e| match e {
            AppError::Generation(_) => e,
            other => AppError::Generation(other.to_string()),
        })?;

        let completion = if self.client.echoes_prompt() {
            response.content
        } else {
            format!("{}{}", prompt, response.content)
        };

        let generation = extract_answer(&completion, &self.response_marker);
        if generation.extraction == Extraction::RawFallback {
            tracing::warn!("Response marker missing from completion; returning it unchanged");
        }

        Ok(generation)
    }
}

/// Return the trimmed text after the last `marker`, or the completion unchanged.
pub fn extract_answer(completion: &str, marker: &str) -> Generation {
    match completion.rfind(marker) {
        Some(pos) => Generation {
            text: completion[pos + marker.len()..].trim().to_string(),
            extraction: Extraction::MarkerFound,
        },
        None => Generation {
            text: completion.to_string(),
            extraction: Extraction::RawFallback,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::scripted::ScriptedClient;

    const MARKER: &str = "### Response:";

    #[test]
    fn test_extracts_after_last_marker() {
        let generation = extract_answer(
            "### Instruction:\n...\n### Response:\n  The answer is X.  ",
            MARKER,
        );
        assert_eq!(generation.text, "The answer is X.");
        assert_eq!(generation.extraction, Extraction::MarkerFound);

        let repeated = extract_answer("### Response: first ### Response: second", MARKER);
        assert_eq!(repeated.text, "second");
    }

    #[test]
    fn test_missing_marker_returns_completion_unchanged() {
        let generation = extract_answer("  no marker here ", MARKER);
        assert_eq!(generation.text, "  no marker here ");
        assert_eq!(generation.extraction, Extraction::RawFallback);
    }

    #[tokio::test]
    async fn test_non_echoing_client_is_prefixed() {
        let client = Arc::new(ScriptedClient::replying(" Give 200,000 IU. "));
        let generator = AnswerGenerator::new(client.clone(), "mistral", MARKER);

        let generation = generator
            .generate("Q?\n### Response:\n", 256, 0.3)
            .await
            .unwrap();
        assert_eq!(generation.text, "Give 200,000 IU.");
        assert_eq!(generation.extraction, Extraction::MarkerFound);

        let request = client.last_request().unwrap();
        assert_eq!(request.max_tokens, Some(256));
        assert_eq!(request.top_p, Some(DEFAULT_TOP_P));
        assert_eq!(request.repeat_penalty, Some(DEFAULT_REPEAT_PENALTY));
    }

    #[tokio::test]
    async fn test_echoing_client_is_used_as_is() {
        let client = Arc::new(
            ScriptedClient::replying("Q?\n### Response:\nStore at 2-8 C.").echoing(),
        );
        let generator = AnswerGenerator::new(client, "mistral", MARKER);

        let generation = generator.generate("ignored", 64, 0.0).await.unwrap();
        assert_eq!(generation.text, "Store at 2-8 C.");
    }

    #[tokio::test]
    async fn test_invalid_parameters_never_call_model() {
        let client = Arc::new(ScriptedClient::replying("unused"));
        let generator = AnswerGenerator::new(client.clone(), "mistral", MARKER);

        assert!(matches!(
            generator.generate("p", 0, 0.3).await,
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            generator.generate("p", 10, -0.1).await,
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            generator.generate("p", 10, f32::NAN).await,
            Err(AppError::Config(_))
        ));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_generation_error() {
        let client = Arc::new(ScriptedClient::failing("model not loaded"));
        let generator = AnswerGenerator::new(client.clone(), "mistral", MARKER);

        let result = generator.generate("p", 10, 0.3).await;
        assert!(matches!(result, Err(AppError::Generation(_))));
        assert_eq!(client.calls(), 1);
    }
}
