//! Batch command handler.

use clap::Args;
use measles_core::{config::AppConfig, AppError, AppResult};
use measles_knowledge::{BatchResponse, BatchStatus, PipelineContext};
use std::path::{Path, PathBuf};

/// Answer several questions in order
#[derive(Args, Debug)]
pub struct BatchCommand {
    /// Questions to answer
    pub questions: Vec<String>,

    /// Read questions from a file, one per line
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl BatchCommand {
    /// Execute the batch command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing batch command");

        let mut questions = match self.file {
            Some(ref path) => read_questions(path)?,
            None => Vec::new(),
        };
        questions.extend(self.questions.iter().cloned());

        let pipeline = PipelineContext::from_app_config(config)?;
        let response = pipeline.batch(questions).await?;

        if self.json {
            super::print_json(&response)
        } else {
            print_batch(&response);
            Ok(())
        }
    }
}

/// Non-blank lines of `path`, trimmed. Lines starting with `#` are skipped.
fn read_questions(path: &Path) -> AppResult<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("Failed to read questions file {:?}: {}", path, e))
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

fn print_batch(response: &BatchResponse) {
    for (i, item) in response.results.iter().enumerate() {
        println!("[{}] {}", i + 1, item.question);
        match item.status {
            BatchStatus::Success => {
                println!("{}", item.answer.as_deref().unwrap_or_default());
                if !item.sources.is_empty() {
                    let sources: Vec<&str> = item.sources.iter().map(String::as_str).collect();
                    println!("Sources: {}", sources.join(", "));
                }
            }
            BatchStatus::Error => {
                println!("Error: {}", item.error.as_deref().unwrap_or("unknown error"));
            }
        }
        println!();
    }

    println!(
        "{} question(s): {} succeeded, {} failed",
        response.total, response.succeeded, response.failed
    );
}
