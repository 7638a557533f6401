//! Text-completion integration crate for the measles guidelines assistant.
//!
//! This crate provides a provider-agnostic abstraction over the generative
//! model. The pipeline treats generation as an opaque text-completion
//! capability and never depends on a model's internals.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenAI-compatible**: `/v1/completions` servers hosting Mistral-7B-Instruct
//!
//! # Example
//! ```no_run
//! use measles_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("### Instruction:\nSay hello.\n\n### Response:\n", "mistral");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient};
pub use types::ProviderType;
