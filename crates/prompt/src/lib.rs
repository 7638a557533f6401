//! Prompt assembly for the measles guidelines assistant.
//!
//! This crate provides:
//! - YAML-based prompt templates with a built-in measles answering template
//! - Handlebars rendering of the instruction/context/question layout
//! - Prompt budget enforcement, dropping the weakest passages first

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::assemble;
pub use loader::{list_templates, load_template, validate_template};
pub use types::{
    AssembledPrompt, ContextPassage, PromptTemplate, DEFAULT_PROMPT_ID, DEFAULT_REFUSAL,
    DEFAULT_RESPONSE_MARKER,
};
