//! Text chunking with configurable window and overlap.

use crate::types::{Chunk, SourceDocument};
use measles_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use text_splitter::{ChunkConfig, TextSplitter};

/// Window size and overlap, both in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    pub window_size: usize,
    pub overlap: usize,
}

impl ChunkParams {
    /// Validate and create chunking parameters.
    pub fn new(window_size: usize, overlap: usize) -> AppResult<Self> {
        if window_size == 0 {
            return Err(AppError::Config(
                "Chunk window size must be greater than zero".to_string(),
            ));
        }
        if overlap >= window_size {
            return Err(AppError::Config(format!(
                "Chunk overlap ({}) must be smaller than the window size ({})",
                overlap, window_size
            )));
        }
        Ok(Self {
            window_size,
            overlap,
        })
    }

    fn splitter(&self) -> AppResult<TextSplitter<text_splitter::Characters>> {
        let config = ChunkConfig::new(self.window_size)
            .with_overlap(self.overlap)
            .map_err(|e| AppError::Config(format!("Invalid chunk configuration: {}", e)))?;
        Ok(TextSplitter::new(config))
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            window_size: 500,
            overlap: 50,
        }
    }
}

/// Chunk every document, preserving document order then window order.
pub fn chunk_documents(documents: &[SourceDocument], params: ChunkParams) -> AppResult<Vec<Chunk>> {
    let splitter = params.splitter()?;

    let mut chunks = Vec::new();
    for document in documents {
        chunks.extend(split_document(&splitter, document));
    }

    tracing::debug!(
        "Chunked {} document(s) into {} chunks (window: {}, overlap: {})",
        documents.len(),
        chunks.len(),
        params.window_size,
        params.overlap
    );

    Ok(chunks)
}

fn split_document(
    splitter: &TextSplitter<text_splitter::Characters>,
    document: &SourceDocument,
) -> Vec<Chunk> {
    splitter
        .chunk_indices(&document.raw_text)
        .filter(|(_, text)| !text.trim().is_empty())
        .enumerate()
        .map(|(chunk_index, (byte_offset, text))| Chunk {
            text: text.to_string(),
            source_id: document.source_id.clone(),
            chunk_index: chunk_index as u32,
            byte_offset,
            content_hash: content_hash(text),
        })
        .collect()
}

/// Hex-encoded SHA-256 of `text`.
pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}
