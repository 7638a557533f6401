//! Examples command handler.

use clap::Args;
use measles_core::AppResult;
use measles_knowledge::PipelineContext;

/// List example questions
#[derive(Args, Debug)]
pub struct ExamplesCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ExamplesCommand {
    pub fn execute(&self) -> AppResult<()> {
        let questions = PipelineContext::example_questions();

        if self.json {
            return super::print_json(&serde_json::json!({ "examples": questions }));
        }

        for question in questions {
            println!("{}", question);
        }
        Ok(())
    }
}
