//! Prompt builder: renders a template with retrieved context under a size budget.

use crate::types::{AssembledPrompt, ContextPassage, PromptTemplate};
use measles_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

const TEMPLATE_NAME: &str = "prompt";

/// Assemble a prompt from a question and ranked passages.
///
/// Passages appear in the context block in the order given. When the rendered
/// prompt exceeds `max_chars` characters, passages are dropped one at a time,
/// lowest score first (ties drop the later passage first), until it fits.
/// An empty passage list renders the template's no-context marker instead.
///
/// Returns `AppError::Validation` when the prompt cannot fit even with every
/// passage dropped, and `AppError::Config` when `max_chars` is zero.
///
/// # Example
/// ```
/// use measles_prompt::{assemble, ContextPassage, PromptTemplate};
///
/// let passages = vec![ContextPassage::new("Store serum at 2-8 C.", 0.82)];
/// let prompt = assemble(
///     "How should serum be stored?",
///     &passages,
///     &PromptTemplate::default(),
///     6000,
/// )
/// .unwrap();
/// assert!(prompt.text.contains("- Store serum at 2-8 C."));
/// ```
pub fn assemble(
    question: &str,
    passages: &[ContextPassage],
    template: &PromptTemplate,
    max_chars: usize,
) -> AppResult<AssembledPrompt> {
    if max_chars == 0 {
        return Err(AppError::Config(
            "Prompt budget must be greater than zero".to_string(),
        ));
    }

    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
        .register_template_string(TEMPLATE_NAME, &template.template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let mut included: Vec<usize> = (0..passages.len()).collect();
    let drop_order = drop_order(passages);
    let mut next_drop = drop_order.iter();

    loop {
        let context = context_block(passages, &included, template);
        let text = render(&handlebars, &context, question, template)?;
        let length = text.chars().count();

        if length <= max_chars {
            let dropped = passages.len() - included.len();
            if dropped > 0 {
                tracing::debug!(
                    "Dropped {} passage(s) to fit prompt budget of {} chars",
                    dropped,
                    max_chars
                );
            }
            return Ok(AssembledPrompt {
                text,
                included,
                dropped,
            });
        }

        match next_drop.next() {
            Some(victim) => included.retain(|i| i != victim),
            None => {
                return Err(AppError::Validation(format!(
                    "Question does not fit the prompt budget ({} chars needed, {} allowed)",
                    length, max_chars
                )))
            }
        }
    }
}

/// Indices in the order they should be dropped: lowest score first,
/// later (lower-ranked) passages first among equal scores.
fn drop_order(passages: &[ContextPassage]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..passages.len()).rev().collect();
    order.sort_by(|a, b| passages[*a].score.total_cmp(&passages[*b].score));
    order
}

fn context_block(
    passages: &[ContextPassage],
    included: &[usize],
    template: &PromptTemplate,
) -> String {
    if included.is_empty() {
        return template.no_context_marker.clone();
    }

    included
        .iter()
        .map(|i| format!("{}{}", template.context_item_prefix, passages[*i].text))
        .collect()
}

fn render(
    handlebars: &Handlebars<'_>,
    context: &str,
    question: &str,
    template: &PromptTemplate,
) -> AppResult<String> {
    let mut variables = HashMap::new();
    variables.insert("context", context);
    variables.insert("question", question);
    variables.insert("refusal", template.refusal.as_str());

    handlebars
        .render(TEMPLATE_NAME, &variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
