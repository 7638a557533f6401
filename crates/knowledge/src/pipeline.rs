//! Answering pipeline: retrieve, assemble, generate, format.

use crate::chunker::ChunkParams;
use crate::embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
use crate::generator::{AnswerGenerator, Extraction};
use crate::index::{ensure_index, IndexState};
use crate::retriever::retrieve;
use chrono::{DateTime, Utc};
use measles_core::{AppConfig, AppError, AppResult, PipelineConfig};
use measles_llm::{create_client, LlmClient};
use measles_prompt::{assemble, load_template, ContextPassage, PromptTemplate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// Version label reported with every answer.
pub const MODEL_VERSION: &str = "ZNPHI-Measles-v1.0";

/// Answers longer than this many characters are labelled `High`.
const HIGH_CONFIDENCE_MIN_CHARS: usize = 50;

const EXAMPLE_QUESTIONS: [&str; 6] = [
    "What is the standard case definition for a suspected measles case?",
    "How should serum samples be stored for measles testing?",
    "What is the Alert Threshold for measles?",
    "What is the recommended Vitamin A dose for children aged 12 months and older?",
    "How do you prepare the wash buffer for the Measles ELISA test?",
    "What should be done if a sample yields an equivocal result?",
];

/// A single question for the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,

    /// Replaces retrieval with caller-supplied context
    #[serde(default)]
    pub context: Option<String>,

    #[serde(default)]
    pub max_new_tokens: Option<u32>,

    #[serde(default)]
    pub temperature: Option<f32>,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_max_new_tokens(mut self, max_new_tokens: u32) -> Self {
        self.max_new_tokens = Some(max_new_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Heuristic label derived from answer length.
///
/// Advisory metadata only: it says nothing about whether the answer is correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
}

impl Confidence {
    pub fn from_answer(answer: &str) -> Self {
        if answer.chars().count() > HIGH_CONFIDENCE_MIN_CHARS {
            Self::High
        } else {
            Self::Medium
        }
    }
}

/// The answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub sources: BTreeSet<String>,
    pub timestamp: DateTime<Utc>,
    pub confidence: Confidence,
    pub model_version: String,
    /// `None` when the refusal was returned without calling the model
    pub extraction: Option<Extraction>,
    /// No guideline context was available for this question
    pub no_context: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Success,
    Error,
}

/// Outcome for one question of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItem {
    pub question: String,
    pub answer: Option<String>,
    pub sources: BTreeSet<String>,
    pub status: BatchStatus,
    pub error: Option<String>,
    pub error_kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResponse {
    pub results: Vec<BatchItem>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timestamp: DateTime<Utc>,
}

/// Readiness of the model and the index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    /// "healthy" or "model_not_loaded"
    pub status: String,
    pub model_loaded: bool,
    pub index_loaded: bool,
    pub index_entries: usize,
    pub index_origin: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

/// Everything needed to answer questions, constructed once and shared.
///
/// The index is built on first use; concurrent callers wait for that build
/// and never observe a partial index. Completions are serialized because the
/// model instance is exclusively owned.
pub struct PipelineContext {
    config: PipelineConfig,
    content_dir: PathBuf,
    index_path: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: AnswerGenerator,
    template: PromptTemplate,
    index: OnceCell<IndexState>,
    generation_lock: Mutex<()>,
}

impl PipelineContext {
    /// Assemble a pipeline from explicit parts.
    pub fn new(
        config: PipelineConfig,
        content_dir: PathBuf,
        index_path: PathBuf,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: AnswerGenerator,
        template: PromptTemplate,
    ) -> AppResult<Self> {
        config.validate()?;
        measles_prompt::validate_template(&template)?;

        Ok(Self {
            config,
            content_dir,
            index_path,
            embedder,
            generator,
            template,
            index: OnceCell::new(),
            generation_lock: Mutex::new(()),
        })
    }

    /// Build the pipeline described by the application configuration.
    pub fn from_app_config(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;

        let client: Arc<dyn LlmClient> = create_client(
            &config.provider,
            &config.model,
            config.endpoint.as_deref(),
            config.api_key.as_deref(),
        )?;
        let embedder = create_provider(&EmbeddingConfig::from_app_config(config))?;
        let template = load_template(&config.workspace, &config.pipeline.prompt_id)?;
        let generator = AnswerGenerator::new(client, &config.model, &template.response_marker);

        Self::new(
            config.pipeline.clone(),
            config.content_dir(),
            config.index_path(),
            embedder,
            generator,
            template,
        )
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Load or build the index once; later calls return the same state.
    pub async fn initialize(&self) -> AppResult<&IndexState> {
        self.index
            .get_or_try_init(|| async {
                let params = ChunkParams::new(self.config.chunk_size, self.config.chunk_overlap)?;
                let state = ensure_index(
                    &self.content_dir,
                    &self.index_path,
                    params,
                    self.embedder.as_ref(),
                    false,
                )
                .await?;

                tracing::info!("Index ready ({})", state.origin.as_str());
                Ok::<_, AppError>(state)
            })
            .await
    }

    /// The index state, if initialization has completed.
    pub fn index_state(&self) -> Option<&IndexState> {
        self.index.get()
    }

    /// Answer one question.
    ///
    /// Blank questions are rejected with `AppError::Validation` before any
    /// retrieval or generation.
    pub async fn answer(&self, request: AskRequest) -> AppResult<AnswerResponse> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(AppError::Validation("Question cannot be empty".to_string()));
        }

        let max_new_tokens = request.max_new_tokens.unwrap_or(self.config.max_new_tokens);
        let temperature = request.temperature.unwrap_or(self.config.temperature);
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

        // Passages in ranked order, each with its source (none for caller context).
        let mut candidates: Vec<(ContextPassage, Option<String>)> = Vec::new();
        match request.context.as_deref().map(str::trim) {
            Some(context) if !context.is_empty() => {
                candidates.push((ContextPassage::new(context, 1.0), None));
            }
            _ => {
                let state = self.initialize().await?;
                let retrieval = retrieve(
                    state.index.as_ref(),
                    self.embedder.as_ref(),
                    question,
                    self.config.top_k,
                )
                .await?;

                candidates.extend(retrieval.result.hits.into_iter().map(|hit| {
                    (
                        ContextPassage::new(hit.chunk.text, hit.score),
                        Some(hit.chunk.source_id),
                    )
                }));
            }
        }

        if candidates.is_empty() && self.config.enforce_refusal {
            tracing::info!("No context for question; returning refusal");
            return Ok(self.refusal(None, true));
        }

        let passages: Vec<ContextPassage> = candidates.iter().map(|(p, _)| p.clone()).collect();
        let prompt = assemble(
            question,
            &passages,
            &self.template,
            self.config.max_prompt_chars,
        )?;
        tracing::debug!(
            "Assembled prompt: {} chars, {} passage(s) included, {} dropped",
            prompt.char_len(),
            prompt.included.len(),
            prompt.dropped
        );

        if prompt.is_context_empty() && self.config.enforce_refusal {
            tracing::info!("No passage fits the prompt budget; returning refusal");
            return Ok(self.refusal(None, true));
        }

        let generation = {
            let _guard = self.generation_lock.lock().await;
            self.generator
                .generate(&prompt.text, max_new_tokens, temperature)
                .await?
        };

        if self.config.enforce_refusal && is_refusal(&generation.text, &self.template.refusal) {
            return Ok(self.refusal(Some(generation.extraction), prompt.is_context_empty()));
        }

        let sources: BTreeSet<String> = prompt
            .included
            .iter()
            .filter_map(|i| candidates[*i].1.clone())
            .collect();

        Ok(AnswerResponse {
            confidence: Confidence::from_answer(&generation.text),
            answer: generation.text,
            sources,
            timestamp: Utc::now(),
            model_version: MODEL_VERSION.to_string(),
            extraction: Some(generation.extraction),
            no_context: prompt.is_context_empty(),
        })
    }

    /// Answer each question in turn; a failed question never stops the rest.
    pub async fn batch(&self, questions: Vec<String>) -> AppResult<BatchResponse> {
        if questions.is_empty() {
            return Err(AppError::Validation("Batch cannot be empty".to_string()));
        }

        let mut results = Vec::with_capacity(questions.len());
        for (i, question) in questions.into_iter().enumerate() {
            let item = match self.answer(AskRequest::new(question.clone())).await {
                Ok(response) => BatchItem {
                    question,
                    answer: Some(response.answer),
                    sources: response.sources,
                    status: BatchStatus::Success,
                    error: None,
                    error_kind: None,
                },
                Err(e) => {
                    tracing::warn!("Batch question {} failed: {}", i + 1, e);
                    BatchItem {
                        question,
                        answer: None,
                        sources: BTreeSet::new(),
                        status: BatchStatus::Error,
                        error_kind: Some(e.kind().to_string()),
                        error: Some(e.to_string()),
                    }
                }
            };
            results.push(item);
        }

        let succeeded = results
            .iter()
            .filter(|r| r.status == BatchStatus::Success)
            .count();

        Ok(BatchResponse {
            total: results.len(),
            failed: results.len() - succeeded,
            succeeded,
            results,
            timestamp: Utc::now(),
        })
    }

    /// Report whether the model and index are loaded.
    pub async fn health(&self) -> HealthStatus {
        let model_loaded = match self.generator.client().health_check().await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::debug!("Model health check failed: {}", e);
                false
            }
        };

        let state = self.index_state();
        let stats = state.and_then(IndexState::stats);

        HealthStatus {
            status: if model_loaded {
                "healthy".to_string()
            } else {
                "model_not_loaded".to_string()
            },
            model_loaded,
            index_loaded: stats.is_some(),
            index_entries: stats.map(|s| s.entries).unwrap_or(0),
            index_origin: state.map(|s| s.origin.as_str().to_string()),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Canned questions covering the main guideline topics.
    pub fn example_questions() -> &'static [&'static str] {
        &EXAMPLE_QUESTIONS
    }

    fn refusal(&self, extraction: Option<Extraction>, no_context: bool) -> AnswerResponse {
        AnswerResponse {
            answer: self.template.refusal.clone(),
            sources: BTreeSet::new(),
            timestamp: Utc::now(),
            confidence: Confidence::from_answer(&self.template.refusal),
            model_version: MODEL_VERSION.to_string(),
            extraction,
            no_context,
        }
    }
}

/// Whether `answer` contains the refusal sentence, ignoring case and final punctuation.
fn is_refusal(answer: &str, refusal: &str) -> bool {
    let sentence = refusal
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .to_lowercase();
    !sentence.is_empty() && answer.to_lowercase().contains(&sentence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_length_based() {
        assert_eq!(Confidence::from_answer("Yes."), Confidence::Medium);
        assert_eq!(Confidence::from_answer(&"x".repeat(50)), Confidence::Medium);
        assert_eq!(Confidence::from_answer(&"x".repeat(51)), Confidence::High);
    }

    #[test]
    fn test_is_refusal() {
        let refusal = "I cannot find that information in the guidelines.";
        assert!(is_refusal(
            "Sorry. I cannot find that information in the guidelines",
            refusal
        ));
        assert!(is_refusal("i CANNOT find that information in the guidelines!", refusal));
        assert!(!is_refusal("Give two doses of Vitamin A.", refusal));
    }

    #[test]
    fn test_example_questions() {
        let questions = PipelineContext::example_questions();
        assert_eq!(questions.len(), 6);
        assert!(questions[2].contains("Alert Threshold"));
    }

    #[test]
    fn test_ask_request_deserialization() {
        let request: AskRequest =
            serde_json::from_str(r#"{"question": "Alert threshold?", "temperature": 0.7}"#)
                .unwrap();
        assert_eq!(request.question, "Alert threshold?");
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.max_new_tokens, None);
    }
}
