//! Index command handler.
//!
//! Loads the persisted guideline index, building it from the content
//! directory when it is missing, stale or `--rebuild` is given.

use clap::Args;
use measles_core::{config::AppConfig, AppResult};
use measles_knowledge::{create_provider, ensure_index, ChunkParams, EmbeddingConfig, IndexOrigin};

/// Load or rebuild the guideline index
#[derive(Args, Debug)]
pub struct IndexCommand {
    /// Ignore the persisted index and rebuild from the content directory
    #[arg(long)]
    pub rebuild: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexCommand {
    /// Execute the index command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing index command (rebuild: {})", self.rebuild);

        config.validate()?;
        let pipeline = &config.pipeline;
        let params = ChunkParams::new(pipeline.chunk_size, pipeline.chunk_overlap)?;
        let provider = create_provider(&EmbeddingConfig::from_app_config(config))?;

        let content_dir = config.content_dir();
        let index_path = config.index_path();
        let state = ensure_index(
            &content_dir,
            &index_path,
            params,
            provider.as_ref(),
            self.rebuild,
        )
        .await?;

        let stats = state.stats();
        let failures = state
            .load_report
            .as_ref()
            .map(|report| report.failures.clone())
            .unwrap_or_default();

        if self.json {
            let output = serde_json::json!({
                "contentDir": content_dir,
                "indexPath": index_path,
                "origin": state.origin,
                "documents": state.load_report.as_ref().map(|r| r.document_count()),
                "entries": stats.map(|s| s.entries).unwrap_or(0),
                "sources": stats.map(|s| s.sources).unwrap_or(0),
                "dimensions": stats.map(|s| s.dimensions),
                "provider": provider.provider_name(),
                "model": provider.model_name(),
                "failures": failures,
            });
            return super::print_json(&output);
        }

        match &state.origin {
            IndexOrigin::Loaded => println!("Loaded index from {}", index_path.display()),
            IndexOrigin::Built => println!("Built index at {}", index_path.display()),
            IndexOrigin::Rebuilt { reason } => {
                println!("Rebuilt index at {} ({})", index_path.display(), reason)
            }
            IndexOrigin::EmptyCorpus { discarded } => {
                println!(
                    "No documents found in {}; answers will use the refusal",
                    content_dir.display()
                );
                if let Some(reason) = discarded {
                    println!("Discarded persisted index ({})", reason);
                }
            }
        }

        if let Some(stats) = stats {
            println!("  Entries:    {}", stats.entries);
            println!("  Sources:    {}", stats.sources);
            println!("  Dimensions: {}", stats.dimensions);
            println!(
                "  Embedder:   {} ({})",
                provider.provider_name(),
                provider.model_name()
            );
        }

        if !failures.is_empty() {
            println!("  Skipped {} file(s):", failures.len());
            for failure in &failures {
                println!("    {}: {}", failure.path.display(), failure.error);
            }
        }

        Ok(())
    }
}
