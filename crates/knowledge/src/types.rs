//! Knowledge system type definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// A guideline document read from the content directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// File name of the document, used as its source identifier
    pub source_id: String,

    /// Extracted text
    pub raw_text: String,
}

/// A bounded slice of a source document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Text content
    pub text: String,

    /// Originating source identifier
    pub source_id: String,

    /// Position within the source, 0-based
    pub chunk_index: u32,

    /// Byte offset of the chunk within the source text
    pub byte_offset: usize,

    /// SHA-256 of the chunk text, hex encoded
    pub content_hash: String,
}

/// A chunk and its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(with = "embedding_bits")]
    pub embedding: Vec<f32>,
    pub chunk: Chunk,
}

/// Embeddings persist as IEEE-754 bit patterns so a reload is bit-exact.
mod embedding_bits {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(embedding: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(embedding.iter().map(|v| v.to_bits()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        Ok(Vec::<u32>::deserialize(deserializer)?
            .into_iter()
            .map(f32::from_bits)
            .collect())
    }
}

/// A retrieved chunk with its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Chunks ordered by descending similarity, at most k long.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Distinct source identifiers of the retrieved chunks.
    pub fn sources(&self) -> BTreeSet<String> {
        self.hits
            .iter()
            .map(|hit| hit.chunk.source_id.clone())
            .collect()
    }
}

/// A file that could not be ingested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of loading a content directory: documents that loaded and files that did not.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    #[serde(skip)]
    pub documents: Vec<SourceDocument>,

    pub failures: Vec<LoadFailure>,

    /// The content directory did not exist and was created empty
    pub awaiting_content: bool,
}

impl LoadReport {
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(source: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                text: format!("text from {}", source),
                source_id: source.to_string(),
                chunk_index: 0,
                byte_offset: 0,
                content_hash: String::new(),
            },
            score,
        }
    }

    #[test]
    fn test_embedding_serializes_bit_exact() {
        let entry = IndexEntry {
            embedding: vec![0.1, -0.0, 1.0 / 3.0],
            chunk: hit("a.pdf", 0.0).chunk,
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains(&0.1f32.to_bits().to_string()));

        let back: IndexEntry = serde_json::from_str(&json).unwrap();
        let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&back.embedding), bits(&entry.embedding));
    }

    #[test]
    fn test_sources_are_deduplicated() {
        let result = RetrievalResult {
            hits: vec![hit("a.pdf", 0.9), hit("a.pdf", 0.8), hit("b.docx", 0.7)],
        };

        let sources: Vec<String> = result.sources().into_iter().collect();
        assert_eq!(sources, vec!["a.pdf", "b.docx"]);
    }
}
