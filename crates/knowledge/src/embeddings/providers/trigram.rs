//! Hashed character-trigram embeddings for offline operation.

use crate::embeddings::provider::EmbeddingProvider;
use measles_core::AppResult;
use std::collections::BTreeMap;

const MODEL_NAME: &str = "trigram-v1";

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what", "how", "should", "does", "when",
];

/// Deterministic embedding provider that needs no model or network.
///
/// Each content word contributes its character trigrams and the word itself to
/// hashed buckets; the vector is then scaled to unit length. Vectors are
/// lexical rather than semantic, which is adequate for guideline lookups
/// that reuse the documents' own vocabulary.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    /// Create a new trigram provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        for (word, freq) in word_frequencies(text) {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                embedding[self.bucket(&trigram, 37)] += (freq as f32).sqrt();
            }
            embedding[self.bucket(&word, 31)] += freq as f32;
        }

        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            embedding.iter_mut().for_each(|v| *v /= norm);
        }

        embedding
    }

    fn bucket(&self, token: &str, multiplier: u64) -> usize {
        let hash = token
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(multiplier).wrapping_add(b as u64));
        (hash % self.dimensions as u64) as usize
    }
}

/// Lowercased content words (punctuation stripped, stop words and short words dropped).
fn word_frequencies(text: &str) -> BTreeMap<String, u32> {
    let mut frequencies = BTreeMap::new();
    for raw in text.to_lowercase().split_whitespace() {
        let word = raw.trim_matches(|c: char| !c.is_alphanumeric());
        if word.chars().count() <= 2 || STOP_WORDS.contains(&word) {
            continue;
        }
        *frequencies.entry(word.to_string()).or_insert(0) += 1;
    }
    frequencies
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}
