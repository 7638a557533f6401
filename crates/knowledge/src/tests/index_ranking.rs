//! Ranking and persistence tests for the embedding index.

use crate::chunker::{chunk_documents, content_hash, ChunkParams};
use crate::embeddings::{EmbeddingProvider, TrigramProvider};
use crate::index::EmbeddingIndex;
use crate::retriever::retrieve;
use crate::types::{Chunk, SourceDocument};
use measles_core::{AppError, AppResult};
use std::collections::HashMap;
use tempfile::TempDir;

/// Embeds from a fixed table so ranking can be asserted exactly.
#[derive(Debug)]
struct TableProvider {
    dimensions: usize,
    table: HashMap<String, Vec<f32>>,
}

impl TableProvider {
    fn new(rows: &[(&str, &[f32])]) -> Self {
        Self {
            dimensions: rows[0].1.len(),
            table: rows
                .iter()
                .map(|(text, v)| (text.to_string(), v.to_vec()))
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TableProvider {
    fn provider_name(&self) -> &str {
        "table"
    }

    fn model_name(&self) -> &str {
        "table-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|text| {
                self.table
                    .get(text)
                    .cloned()
                    .ok_or_else(|| AppError::IndexBuild(format!("no vector for {}", text)))
            })
            .collect()
    }
}

fn chunk(source: &str, text: &str) -> Chunk {
    Chunk {
        text: text.to_string(),
        source_id: source.to_string(),
        chunk_index: 0,
        byte_offset: 0,
        content_hash: content_hash(text),
    }
}

fn provider() -> TableProvider {
    TableProvider::new(&[
        ("case definition", &[1.0, 0.0, 0.0]),
        ("specimen storage", &[0.7, 0.7, 0.0]),
        ("vitamin a dose", &[0.0, 1.0, 0.0]),
        ("elisa wash buffer", &[-1.0, 0.0, 0.0]),
        ("query", &[0.9, 0.1, 0.0]),
    ])
}

async fn build(provider: &TableProvider) -> EmbeddingIndex {
    EmbeddingIndex::build(
        vec![
            chunk("a.pdf", "case definition"),
            chunk("a.pdf", "specimen storage"),
            chunk("b.docx", "vitamin a dose"),
            chunk("c.pdf", "elisa wash buffer"),
        ],
        provider,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_scores_are_ordered_descending() {
    let provider = provider();
    let index = build(&provider).await;

    let result = index.search(&provider, "query", 4).await.unwrap();
    let texts: Vec<&str> = result.hits.iter().map(|h| h.chunk.text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["case definition", "specimen storage", "vitamin a dose", "elisa wash buffer"]
    );
    assert!(result.hits.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(result.hits[0].score > 0.9);
    assert!(result.hits[3].score < 0.0);
}

#[tokio::test]
async fn test_k_bounds_result_length() {
    let provider = provider();
    let index = build(&provider).await;

    assert_eq!(index.search(&provider, "query", 2).await.unwrap().len(), 2);
    assert_eq!(index.search(&provider, "query", 10).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_ties_keep_ingestion_order() {
    let provider = TableProvider::new(&[
        ("first", &[1.0, 0.0]),
        ("second", &[1.0, 0.0]),
        ("third", &[1.0, 0.0]),
        ("query", &[1.0, 0.0]),
    ]);
    let index = EmbeddingIndex::build(
        vec![chunk("a.pdf", "first"), chunk("a.pdf", "second"), chunk("a.pdf", "third")],
        &provider,
    )
    .await
    .unwrap();

    let result = index.search(&provider, "query", 2).await.unwrap();
    let texts: Vec<&str> = result.hits.iter().map(|h| h.chunk.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
}

#[tokio::test]
async fn test_retrieval_sources_are_deduplicated() {
    let provider = provider();
    let index = build(&provider).await;

    let retrieval = retrieve(Some(&index), &provider, "query", 3).await.unwrap();
    assert!(!retrieval.no_context);

    let sources: Vec<String> = retrieval.result.sources().into_iter().collect();
    assert_eq!(sources, vec!["a.pdf", "b.docx"]);
}

#[tokio::test]
async fn test_build_fails_when_embedder_fails() {
    let provider = provider();
    let result = EmbeddingIndex::build(vec![chunk("a.pdf", "unknown text")], &provider).await;
    assert!(matches!(result, Err(AppError::IndexBuild(_))));
}

#[tokio::test]
async fn test_save_load_round_trip_fidelity() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("index/measles-index.json");
    let provider = TrigramProvider::new(256);

    let documents = vec![
        SourceDocument {
            source_id: "idsr.pdf".to_string(),
            raw_text: "A suspected measles case is any person with fever and maculopapular rash \
                       with cough, coryza or conjunctivitis.\n\nThe alert threshold is one \
                       suspected case in a health facility."
                .to_string(),
        },
        SourceDocument {
            source_id: "lab-sop.docx".to_string(),
            raw_text: "Serum samples should be stored at 2-8 degrees and shipped within \
                       three days. Equivocal results require a second sample."
                .to_string(),
        },
    ];
    let chunks = chunk_documents(&documents, ChunkParams::new(120, 20).unwrap()).unwrap();

    let built = EmbeddingIndex::build(chunks, &provider).await.unwrap();
    built.save(&path).unwrap();
    let loaded = EmbeddingIndex::load(&path, &provider).unwrap();
    assert_eq!(loaded, built);

    for query in [
        "What is the alert threshold?",
        "How should serum samples be stored?",
        "What if the result is equivocal?",
    ] {
        assert_eq!(
            loaded.search(&provider, query, 3).await.unwrap(),
            built.search(&provider, query, 3).await.unwrap()
        );
    }

    // Saving the loaded index reproduces the same bytes.
    let first = std::fs::read(&path).unwrap();
    loaded.save(&path).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), first);
}
