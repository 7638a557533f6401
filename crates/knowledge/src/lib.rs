//! Retrieval-augmented answering over measles surveillance guidelines.
//!
//! Documents in the content directory are loaded, chunked, embedded and kept
//! in a persisted index. Questions are answered by retrieving the closest
//! chunks, assembling a bounded prompt and extracting the model's answer.
//!
//! # Example
//! ```no_run
//! use measles_core::AppConfig;
//! use measles_knowledge::{AskRequest, PipelineContext};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load()?;
//! let pipeline = PipelineContext::from_app_config(&config)?;
//! let response = pipeline
//!     .answer(AskRequest::new("What is the Alert Threshold for measles?"))
//!     .await?;
//! println!("{} ({:?})", response.answer, response.sources);
//! # Ok(())
//! # }
//! ```

pub mod chunker;
pub mod embeddings;
pub mod generator;
pub mod index;
pub mod loader;
pub mod pipeline;
pub mod retriever;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use chunker::{chunk_documents, ChunkParams};
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use generator::{AnswerGenerator, Extraction, Generation};
pub use index::{ensure_index, EmbeddingIndex, IndexOrigin, IndexState, IndexStats};
pub use loader::load_directory;
pub use pipeline::{
    AnswerResponse, AskRequest, BatchItem, BatchResponse, BatchStatus, Confidence, HealthStatus,
    PipelineContext, MODEL_VERSION,
};
pub use retriever::{retrieve, Retrieval};
pub use types::{Chunk, IndexEntry, LoadFailure, LoadReport, RetrievalResult, ScoredChunk, SourceDocument};
