//! Ask command handler.
//!
//! Answers a single question from the guideline index.

use clap::Args;
use measles_core::{config::AppConfig, AppResult};
use measles_knowledge::{AnswerResponse, AskRequest, PipelineContext};

/// Ask one question about the guidelines
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Answer from this text instead of retrieving from the index
    #[arg(long)]
    pub context: Option<String>,

    /// Maximum tokens to generate
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature (non-negative)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let pipeline = PipelineContext::from_app_config(config)?;
        let response = pipeline.answer(self.request()).await?;

        if self.json {
            super::print_json(&response)
        } else {
            print_answer(&response);
            Ok(())
        }
    }

    fn request(&self) -> AskRequest {
        let mut request = AskRequest::new(&self.question);
        if let Some(ref context) = self.context {
            request = request.with_context(context);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_new_tokens(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        request
    }
}

fn print_answer(response: &AnswerResponse) {
    println!("{}", response.answer);

    if !response.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &response.sources {
            println!("  - {}", source);
        }
    }

    tracing::debug!(
        "Confidence: {:?}, model version: {}",
        response.confidence,
        response.model_version
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_overrides() {
        let command = AskCommand {
            question: "When should vitamin A be given?".to_string(),
            context: Some("Give vitamin A on diagnosis.".to_string()),
            max_tokens: Some(64),
            temperature: Some(0.0),
            json: false,
        };

        let request = command.request();
        assert_eq!(request.question, "When should vitamin A be given?");
        assert_eq!(request.context.as_deref(), Some("Give vitamin A on diagnosis."));
        assert_eq!(request.max_new_tokens, Some(64));
        assert_eq!(request.temperature, Some(0.0));
    }
}
