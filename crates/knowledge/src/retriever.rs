//! Retrieval of the chunks most relevant to a question.

use crate::embeddings::EmbeddingProvider;
use crate::index::EmbeddingIndex;
use crate::types::RetrievalResult;
use measles_core::{AppError, AppResult};

/// Retrieved chunks plus whether the caller must proceed without context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieval {
    pub result: RetrievalResult,
    pub no_context: bool,
}

/// Fetch the `k` chunks most similar to `query`.
///
/// An absent index (empty corpus) or an index with no matches yields an empty
/// result flagged `no_context` rather than an error.
pub async fn retrieve(
    index: Option<&EmbeddingIndex>,
    provider: &dyn EmbeddingProvider,
    query: &str,
    k: usize,
) -> AppResult<Retrieval> {
    if k == 0 {
        return Err(AppError::Config("k must be greater than zero".to_string()));
    }

    let Some(index) = index else {
        tracing::debug!("No index available; retrieval returns no context");
        return Ok(Retrieval {
            result: RetrievalResult::default(),
            no_context: true,
        });
    };

    let result = index.search(provider, query, k).await?;
    tracing::debug!(
        "Retrieved {} chunk(s) from {} source(s)",
        result.len(),
        result.sources().len()
    );

    Ok(Retrieval {
        no_context: result.is_empty(),
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::TrigramProvider;

    #[tokio::test]
    async fn test_absent_index_signals_no_context() {
        let provider = TrigramProvider::new(64);
        let retrieval = retrieve(None, &provider, "Alert threshold?", 3).await.unwrap();
        assert!(retrieval.no_context);
        assert!(retrieval.result.is_empty());
    }

    #[tokio::test]
    async fn test_zero_k_is_config_error() {
        let provider = TrigramProvider::new(64);
        let result = retrieve(None, &provider, "Alert threshold?", 0).await;
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
