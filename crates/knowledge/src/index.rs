//! Embedding index: exact cosine search over chunk embeddings, persisted as JSON.

use crate::chunker::{chunk_documents, ChunkParams};
use crate::embeddings::EmbeddingProvider;
use crate::loader::load_directory;
use crate::types::{Chunk, IndexEntry, LoadReport, RetrievalResult, ScoredChunk};
use measles_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Format tag written into every persisted index.
pub const INDEX_FORMAT: &str = "measles-embedding-index";

/// Persisted layout version; bump on any incompatible change.
pub const INDEX_VERSION: u32 = 1;

/// A fully built, searchable set of chunk embeddings.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingIndex {
    provider: String,
    model: String,
    dimensions: usize,
    entries: Vec<IndexEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedIndex {
    format: String,
    version: u32,
    provider: String,
    model: String,
    dimensions: usize,
    checksum: String,
    entries: Vec<IndexEntry>,
}

/// Summary counts for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub entries: usize,
    pub sources: usize,
    pub dimensions: usize,
}

impl EmbeddingIndex {
    /// Embed every chunk and build the index.
    ///
    /// Fails with `AppError::IndexBuild` if a chunk is blank, the provider fails,
    /// or an embedding has the wrong dimensionality.
    pub async fn build(chunks: Vec<Chunk>, provider: &dyn EmbeddingProvider) -> AppResult<Self> {
        if let Some(blank) = chunks.iter().find(|c| c.text.trim().is_empty()) {
            return Err(AppError::IndexBuild(format!(
                "Chunk {} of {} has no text",
                blank.chunk_index, blank.source_id
            )));
        }

        tracing::info!(
            "Embedding {} chunks with {} ({})",
            chunks.len(),
            provider.provider_name(),
            provider.model_name()
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = provider
            .embed_batch(&texts)
            .await
            .map_err(|e| AppError::IndexBuild(format!("Embedding failed: {}", e)))?;

        if embeddings.len() != chunks.len() {
            return Err(AppError::IndexBuild(format!(
                "Provider returned {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let dimensions = provider.dimensions();
        let mut entries = Vec::with_capacity(chunks.len());
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            if embedding.len() != dimensions {
                return Err(AppError::IndexBuild(format!(
                    "Embedding for chunk {} of {} has {} dimensions, expected {}",
                    chunk.chunk_index,
                    chunk.source_id,
                    embedding.len(),
                    dimensions
                )));
            }
            entries.push(IndexEntry { embedding, chunk });
        }

        Ok(Self {
            provider: provider.provider_name().to_string(),
            model: provider.model_name().to_string(),
            dimensions,
            entries,
        })
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        let sources: BTreeSet<&str> = self
            .entries
            .iter()
            .map(|e| e.chunk.source_id.as_str())
            .collect();

        IndexStats {
            entries: self.entries.len(),
            sources: sources.len(),
            dimensions: self.dimensions,
        }
    }

    /// Embed `query` and return the `k` most similar chunks.
    pub async fn search(
        &self,
        provider: &dyn EmbeddingProvider,
        query: &str,
        k: usize,
    ) -> AppResult<RetrievalResult> {
        if k == 0 {
            return Err(AppError::Config("k must be greater than zero".to_string()));
        }
        if self.entries.is_empty() {
            return Ok(RetrievalResult::default());
        }

        let query_embedding = provider.embed(query).await?;
        self.search_embedding(&query_embedding, k)
    }

    /// Return the `k` entries most similar to `query_embedding`.
    ///
    /// Results are ordered by non-increasing cosine similarity; equal scores
    /// keep ingestion order.
    pub fn search_embedding(&self, query_embedding: &[f32], k: usize) -> AppResult<RetrievalResult> {
        if k == 0 {
            return Err(AppError::Config("k must be greater than zero".to_string()));
        }
        if self.entries.is_empty() {
            return Ok(RetrievalResult::default());
        }
        if query_embedding.len() != self.dimensions {
            return Err(AppError::Config(format!(
                "Query embedding has {} dimensions, index has {}",
                query_embedding.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(query_embedding, &entry.embedding)))
            .collect();

        // Stable sort keeps ingestion order among ties.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(RetrievalResult {
            hits: scored
                .into_iter()
                .map(|(i, score)| ScoredChunk {
                    chunk: self.entries[i].chunk.clone(),
                    score,
                })
                .collect(),
        })
    }

    /// Persist the index, replacing any existing file atomically.
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let persisted = PersistedIndex {
            format: INDEX_FORMAT.to_string(),
            version: INDEX_VERSION,
            provider: self.provider.clone(),
            model: self.model.clone(),
            dimensions: self.dimensions,
            checksum: entries_checksum(&self.entries)?,
            entries: self.entries.clone(),
        };

        let tmp_path = temp_path(path);
        fs::write(&tmp_path, serde_json::to_vec(&persisted)?)?;
        fs::rename(&tmp_path, path)?;

        tracing::info!("Saved index with {} entries to {:?}", self.entries.len(), path);
        Ok(())
    }

    /// Load a persisted index built with `provider`'s embedding model.
    pub fn load(path: &Path, provider: &dyn EmbeddingProvider) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::IndexLoad(format!("No index at {:?}", path)));
        }

        let bytes = fs::read(path)
            .map_err(|e| AppError::IndexLoad(format!("Failed to read {:?}: {}", path, e)))?;
        let persisted: PersistedIndex = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::IndexLoad(format!("Failed to parse {:?}: {}", path, e)))?;

        if persisted.format != INDEX_FORMAT || persisted.version != INDEX_VERSION {
            return Err(AppError::IndexLoad(format!(
                "Unsupported index format {} v{} (expected {} v{})",
                persisted.format, persisted.version, INDEX_FORMAT, INDEX_VERSION
            )));
        }

        if persisted.provider != provider.provider_name()
            || persisted.model != provider.model_name()
            || persisted.dimensions != provider.dimensions()
        {
            return Err(AppError::IndexLoad(format!(
                "Index was built with {}/{} ({} dims), current embedder is {}/{} ({} dims)",
                persisted.provider,
                persisted.model,
                persisted.dimensions,
                provider.provider_name(),
                provider.model_name(),
                provider.dimensions()
            )));
        }

        if entries_checksum(&persisted.entries)? != persisted.checksum {
            return Err(AppError::IndexLoad(format!(
                "Checksum mismatch in {:?}",
                path
            )));
        }

        if let Some(bad) = persisted
            .entries
            .iter()
            .find(|e| e.embedding.len() != persisted.dimensions)
        {
            return Err(AppError::IndexLoad(format!(
                "Entry for chunk {} of {} has {} dimensions, expected {}",
                bad.chunk.chunk_index,
                bad.chunk.source_id,
                bad.embedding.len(),
                persisted.dimensions
            )));
        }

        tracing::info!(
            "Loaded index with {} entries from {:?}",
            persisted.entries.len(),
            path
        );

        Ok(Self {
            provider: persisted.provider,
            model: persisted.model,
            dimensions: persisted.dimensions,
            entries: persisted.entries,
        })
    }
}

/// How the served index came to be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexOrigin {
    /// Loaded from the persisted file
    Loaded,
    /// Built from the content directory; no persisted index existed
    Built,
    /// A persisted index existed but was discarded and rebuilt
    Rebuilt { reason: String },
    /// The content directory yielded no documents; running without context.
    /// `discarded` holds the reason a persisted index was dropped, if one was.
    EmptyCorpus { discarded: Option<String> },
}

impl IndexOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Built => "built",
            Self::Rebuilt { .. } => "rebuilt",
            Self::EmptyCorpus { .. } => "empty_corpus",
        }
    }
}

/// The index available to the pipeline, with how it was obtained.
#[derive(Debug, Clone)]
pub struct IndexState {
    /// `None` when the corpus is empty
    pub index: Option<EmbeddingIndex>,
    pub origin: IndexOrigin,
    /// Present whenever the content directory was read
    pub load_report: Option<LoadReport>,
}

impl IndexState {
    pub fn stats(&self) -> Option<IndexStats> {
        self.index.as_ref().map(EmbeddingIndex::stats)
    }
}

/// Load the persisted index, or build (and save) one from `content_dir`.
///
/// With `force_rebuild` the persisted index is ignored. A corrupt or
/// incompatible persisted index is discarded, rebuilt, and reported as
/// `IndexOrigin::Rebuilt`.
pub async fn ensure_index(
    content_dir: &Path,
    index_path: &Path,
    params: ChunkParams,
    provider: &dyn EmbeddingProvider,
    force_rebuild: bool,
) -> AppResult<IndexState> {
    let rebuild_reason = if force_rebuild {
        Some("rebuild requested".to_string())
    } else if index_path.exists() {
        match EmbeddingIndex::load(index_path, provider) {
            Ok(index) => {
                return Ok(IndexState {
                    index: Some(index),
                    origin: IndexOrigin::Loaded,
                    load_report: None,
                })
            }
            Err(e) => {
                tracing::warn!("Discarding persisted index, rebuilding: {}", e);
                Some(e.to_string())
            }
        }
    } else {
        None
    };

    let report = load_directory(content_dir)?;
    let chunks = chunk_documents(&report.documents, params)?;

    if chunks.is_empty() {
        tracing::warn!(
            "No documents to index in {:?}; answering without context",
            content_dir
        );
        return Ok(IndexState {
            index: None,
            origin: IndexOrigin::EmptyCorpus {
                discarded: rebuild_reason,
            },
            load_report: Some(report),
        });
    }

    let index = EmbeddingIndex::build(chunks, provider).await?;
    if let Err(e) = index.save(index_path) {
        tracing::warn!("Failed to persist index to {:?}: {}", index_path, e);
    }

    let origin = match rebuild_reason {
        Some(reason) => IndexOrigin::Rebuilt { reason },
        None => IndexOrigin::Built,
    };

    Ok(IndexState {
        index: Some(index),
        origin,
        load_report: Some(report),
    })
}

fn entries_checksum(entries: &[IndexEntry]) -> AppResult<String> {
    let bytes = serde_json::to_vec(entries)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Cosine similarity; zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
