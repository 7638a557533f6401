//! Embedding providers for guideline chunks and questions.
//!
//! Chunks and queries must be embedded by the same provider and model; the
//! persisted index records both so a mismatch is caught on load.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
pub use providers::{OllamaProvider, TrigramProvider};
