//! Configuration management for the measles guidelines assistant.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Defaults
//! - Config file (.measles/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with persisted state stored in `.measles/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Completion providers understood by the LLM factory.
pub const KNOWN_PROVIDERS: [&str; 2] = ["ollama", "openai"];

/// Embedding providers understood by the embedding factory.
pub const KNOWN_EMBEDDING_PROVIDERS: [&str; 2] = ["trigram", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .measles/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Completion provider ("ollama" or "openai")
    pub provider: String,

    /// Completion model identifier
    pub model: String,

    /// Optional custom endpoint for the completion provider
    pub endpoint: Option<String>,

    /// API key for the completion provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Retrieval and generation parameters
    pub pipeline: PipelineConfig,
}

/// Parameters of the answering pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Directory holding the guideline documents (relative to workspace)
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    /// Persisted index location (relative to workspace)
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Chunk window in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Number of chunks retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Maximum length of the assembled prompt in characters
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,

    /// Default generation length
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,

    /// Default sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Embedding provider ("trigram" or "ollama")
    #[serde(default = "default_embedding_provider")]
    pub embedding_provider: String,

    /// Embedding model identifier
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Embedding vector dimension
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,

    /// Prompt template identifier
    #[serde(default = "default_prompt_id")]
    pub prompt_id: String,

    /// Answer with the literal refusal, without generating, when no context is found
    #[serde(default = "default_enforce_refusal")]
    pub enforce_refusal: bool,
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("guidelines")
}

fn default_index_path() -> PathBuf {
    PathBuf::from(".measles/index/measles-index.json")
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_top_k() -> usize {
    3
}

fn default_max_prompt_chars() -> usize {
    6000
}

fn default_max_new_tokens() -> u32 {
    256
}

fn default_temperature() -> f32 {
    0.3
}

fn default_embedding_provider() -> String {
    "trigram".to_string()
}

fn default_embedding_model() -> String {
    "trigram-v1".to_string()
}

fn default_embedding_dimensions() -> usize {
    384
}

fn default_prompt_id() -> String {
    "measles.answer.default".to_string()
}

fn default_enforce_refusal() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
            index_path: default_index_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            max_prompt_chars: default_max_prompt_chars(),
            max_new_tokens: default_max_new_tokens(),
            temperature: default_temperature(),
            embedding_provider: default_embedding_provider(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            prompt_id: default_prompt_id(),
            enforce_refusal: default_enforce_refusal(),
        }
    }
}

impl PipelineConfig {
    /// Reject every invalid parameter before any work is attempted.
    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("chunkSize must be greater than 0".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunkOverlap ({}) must be smaller than chunkSize ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(AppError::Config("topK must be greater than 0".to_string()));
        }
        if self.max_prompt_chars == 0 {
            return Err(AppError::Config(
                "maxPromptChars must be greater than 0".to_string(),
            ));
        }
        if self.max_new_tokens == 0 {
            return Err(AppError::Config(
                "maxNewTokens must be greater than 0".to_string(),
            ));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(AppError::Config(format!(
                "temperature must be a non-negative number, got {}",
                self.temperature
            )));
        }
        if self.embedding_dimensions == 0 {
            return Err(AppError::Config(
                "embeddingDimensions must be greater than 0".to_string(),
            ));
        }
        if !KNOWN_EMBEDDING_PROVIDERS.contains(&self.embedding_provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding_provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }
        Ok(())
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmSection>,
    workspace: Option<WorkspaceSection>,
    logging: Option<LoggingSection>,
    pipeline: Option<PipelineConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LlmSection {
    provider: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    #[serde(rename = "apiKeyEnv")]
    api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "mistral".to_string(),
            endpoint: None,
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML config file and environment variables.
    ///
    /// Environment variables:
    /// - `MEASLES_WORKSPACE`: Override workspace path
    /// - `MEASLES_CONFIG`: Path to config file
    /// - `MEASLES_PROVIDER`: Completion provider
    /// - `MEASLES_MODEL`: Model identifier
    /// - `MEASLES_ENDPOINT`: Provider endpoint
    /// - `MEASLES_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use measles_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], with the workspace and config file chosen
    /// by the caller before the YAML file is located and merged.
    ///
    /// Explicit paths take precedence over `MEASLES_WORKSPACE` and
    /// `MEASLES_CONFIG`. An explicitly named config file must exist.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace
            .clone()
            .or_else(|| std::env::var("MEASLES_WORKSPACE").ok().map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("MEASLES_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        if let Some(ref path) = config.config_file {
            if !path.exists() {
                return Err(AppError::Config(format!(
                    "Config file does not exist: {:?}",
                    path
                )));
            }
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.workspace.join(".measles/config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // An explicit workspace outranks `workspace.path` in the file
        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("MEASLES_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("MEASLES_MODEL") {
            config.model = model;
        }

        if let Ok(endpoint) = std::env::var("MEASLES_ENDPOINT") {
            config.endpoint = Some(endpoint);
        }

        if let Ok(key) = std::env::var("MEASLES_API_KEY") {
            config.api_key = Some(key);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(llm) = config_file.llm {
            if let Some(provider) = llm.provider {
                result.provider = provider;
            }
            if let Some(model) = llm.model {
                result.model = model;
            }
            if llm.endpoint.is_some() {
                result.endpoint = llm.endpoint;
            }
            if let Some(env_var) = llm.api_key_env {
                result.api_key = std::env::var(&env_var).ok();
            }
        }

        if let Some(pipeline) = config_file.pipeline {
            result.pipeline = pipeline;
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .measles directory.
    pub fn state_dir(&self) -> PathBuf {
        self.workspace.join(".measles")
    }

    /// Ensure the .measles directory exists.
    pub fn ensure_state_dir(&self) -> AppResult<()> {
        let state_dir = self.state_dir();
        if !state_dir.exists() {
            std::fs::create_dir_all(&state_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .measles directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Absolute path of the guideline content directory.
    pub fn content_dir(&self) -> PathBuf {
        resolve(&self.workspace, &self.pipeline.content_dir)
    }

    /// Absolute path of the persisted index.
    pub fn index_path(&self) -> PathBuf {
        resolve(&self.workspace, &self.pipeline.index_path)
    }

    /// Validate the provider selection and pipeline parameters.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.model.trim().is_empty() {
            return Err(AppError::Config("Model identifier cannot be empty".to_string()));
        }

        self.pipeline.validate()
    }
}

fn resolve(workspace: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}
