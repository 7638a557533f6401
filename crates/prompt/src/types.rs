//! Prompt types for the measles guidelines assistant.

use serde::{Deserialize, Serialize};

/// Identifier of the built-in answering template.
pub const DEFAULT_PROMPT_ID: &str = "measles.answer.default";

/// Literal answer given when the guidelines do not support an answer.
pub const DEFAULT_REFUSAL: &str = "I cannot find that information in the guidelines.";

/// Marker preceding the generated answer in a completion.
pub const DEFAULT_RESPONSE_MARKER: &str = "### Response:";

const DEFAULT_TEMPLATE: &str = "### Instruction:
You are an expert medical assistant for measles surveillance in Zambia.
Use the Context below to answer the Question strictly based on the guidelines.
If the answer is not in the context, say \"{{refusal}}\"

### Context:{{context}}

### Question:
{{question}}

### Response:
";

/// An instruction/context/question template loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptTemplate {
    /// Unique template identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Handlebars template using `{{context}}`, `{{question}}` and `{{refusal}}`
    pub template: String,

    /// Marker after which the model writes its answer
    #[serde(rename = "responseMarker", default = "default_response_marker")]
    pub response_marker: String,

    /// Exact refusal sentence the model must emit when context is insufficient
    #[serde(default = "default_refusal")]
    pub refusal: String,

    /// Context block used when no passage is available
    #[serde(rename = "noContextMarker", default = "default_no_context_marker")]
    pub no_context_marker: String,

    /// Prefix written before each passage in the context block
    #[serde(rename = "contextItemPrefix", default = "default_context_item_prefix")]
    pub context_item_prefix: String,
}

fn default_response_marker() -> String {
    DEFAULT_RESPONSE_MARKER.to_string()
}

fn default_refusal() -> String {
    DEFAULT_REFUSAL.to_string()
}

fn default_no_context_marker() -> String {
    "\nNo context available.".to_string()
}

fn default_context_item_prefix() -> String {
    "\n- ".to_string()
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            id: DEFAULT_PROMPT_ID.to_string(),
            title: "Measles surveillance guideline answer".to_string(),
            api_version: "1.0".to_string(),
            template: DEFAULT_TEMPLATE.to_string(),
            response_marker: default_response_marker(),
            refusal: default_refusal(),
            no_context_marker: default_no_context_marker(),
            context_item_prefix: default_context_item_prefix(),
        }
    }
}

/// A retrieved passage offered to the assembler, with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextPassage {
    /// Passage text
    pub text: String,

    /// Similarity to the question; lower scores are dropped first
    pub score: f32,
}

impl ContextPassage {
    /// Create a passage.
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}

/// A fully assembled prompt ready for generation.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    /// Rendered prompt text
    pub text: String,

    /// Indices (into the offered passages, ascending) that made it into the prompt
    pub included: Vec<usize>,

    /// Number of passages dropped to satisfy the budget
    pub dropped: usize,
}

impl AssembledPrompt {
    /// Whether the prompt carries no context passage at all.
    pub fn is_context_empty(&self) -> bool {
        self.included.is_empty()
    }

    /// Length of the prompt in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
