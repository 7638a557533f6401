//! Health command handler.

use clap::Args;
use measles_core::{config::AppConfig, AppResult};
use measles_knowledge::PipelineContext;

/// Report model and index readiness
#[derive(Args, Debug)]
pub struct HealthCommand {
    /// Report without loading or building the index
    #[arg(long)]
    pub skip_index: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl HealthCommand {
    /// Execute the health command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing health command");

        let pipeline = PipelineContext::from_app_config(config)?;
        if !self.skip_index {
            if let Err(e) = pipeline.initialize().await {
                tracing::warn!("Index unavailable: {}", e);
            }
        }

        let health = pipeline.health().await;

        if self.json {
            return super::print_json(&health);
        }

        println!("Status:       {}", health.status);
        println!("Model loaded: {}", health.model_loaded);
        println!("Index loaded: {}", health.index_loaded);
        println!("Entries:      {}", health.index_entries);
        if let Some(ref origin) = health.index_origin {
            println!("Index origin: {}", origin);
        }
        println!("Version:      {}", health.version);

        Ok(())
    }
}
