//! Prompt loader for YAML template definitions.

use crate::types::{PromptTemplate, DEFAULT_PROMPT_ID};
use measles_core::{AppError, AppResult};
use std::path::Path;

const PROMPTS_DIR: &str = ".measles/prompts";

/// Load a prompt template by ID from the workspace.
///
/// Searches for `<id>.yml` in `.measles/prompts/`. When no such file exists
/// and `prompt_id` names the built-in template, the built-in is returned.
///
/// # Example
/// ```no_run
/// use measles_prompt::load_template;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let template = load_template(Path::new("."), "measles.answer.default")?;
/// println!("Loaded prompt: {}", template.title);
/// # Ok(())
/// # }
/// ```
pub fn load_template(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptTemplate> {
    let prompt_file = workspace_path
        .join(PROMPTS_DIR)
        .join(format!("{}.yml", prompt_id));

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        if prompt_id == DEFAULT_PROMPT_ID {
            tracing::debug!("Using built-in prompt template");
            return Ok(PromptTemplate::default());
        }
        let available = list_templates(workspace_path)?;
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?} (available: {})",
            prompt_file,
            available.join(", ")
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let template: PromptTemplate = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_template(&template)?;

    tracing::info!("Loaded prompt: {} ({})", template.id, template.title);

    Ok(template)
}

/// List the prompt IDs available in the workspace, built-in included.
pub fn list_templates(workspace_path: &Path) -> AppResult<Vec<String>> {
    let prompts_dir = workspace_path.join(PROMPTS_DIR);
    let mut ids = vec![DEFAULT_PROMPT_ID.to_string()];

    if prompts_dir.exists() {
        for entry in walkdir::WalkDir::new(&prompts_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
    }

    ids.sort();
    ids.dedup();
    Ok(ids)
}

/// Validate a prompt template.
pub fn validate_template(def: &PromptTemplate) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    for placeholder in ["{{question}}", "{{context}}"] {
        if !def.template.contains(placeholder) {
            return Err(AppError::Prompt(format!(
                "Prompt template {} must contain {}",
                def.id, placeholder
            )));
        }
    }

    if def.response_marker.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt responseMarker cannot be empty".to_string(),
        ));
    }

    if !def.template.contains(&def.response_marker) {
        return Err(AppError::Prompt(format!(
            "Prompt template {} does not contain its response marker {:?}",
            def.id, def.response_marker
        )));
    }

    if def.refusal.trim().is_empty() {
        return Err(AppError::Prompt("Prompt refusal cannot be empty".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_prompt(dir: &Path, id: &str, body: &str) {
        let prompts_dir = dir.join(PROMPTS_DIR);
        fs::create_dir_all(&prompts_dir).unwrap();
        fs::write(prompts_dir.join(format!("{}.yml", id)), body).unwrap();
    }

    #[test]
    fn test_builtin_fallback() {
        let temp = TempDir::new().unwrap();
        let template = load_template(temp.path(), DEFAULT_PROMPT_ID).unwrap();
        assert_eq!(template, PromptTemplate::default());
    }

    #[test]
    fn test_missing_custom_prompt() {
        let temp = TempDir::new().unwrap();
        let result = load_template(temp.path(), "measles.answer.missing");
        match result {
            Err(AppError::Prompt(msg)) => assert!(msg.contains(DEFAULT_PROMPT_ID)),
            other => panic!("Expected prompt error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_custom_prompt() {
        let temp = TempDir::new().unwrap();
        write_prompt(
            temp.path(),
            "measles.answer.brief",
            r####"
id: measles.answer.brief
title: Brief answers
apiVersion: "1.1"
template: "Context:{{context}}\nQuestion: {{question}}\n### Answer:\n"
responseMarker: "### Answer:"
"####,
        );

        let template = load_template(temp.path(), "measles.answer.brief").unwrap();
        assert_eq!(template.response_marker, "### Answer:");

        let ids = list_templates(temp.path()).unwrap();
        assert_eq!(ids, vec!["measles.answer.brief", DEFAULT_PROMPT_ID]);
    }

    #[test]
    fn test_template_without_marker_is_rejected() {
        let temp = TempDir::new().unwrap();
        write_prompt(
            temp.path(),
            "broken",
            r#"
id: broken
title: Broken
apiVersion: "1.0"
template: "{{context}} {{question}}"
"#,
        );

        let err = load_template(temp.path(), "broken").unwrap_err();
        assert!(err.to_string().contains("response marker"));
    }

    #[test]
    fn test_invalid_api_version() {
        let mut def = PromptTemplate::default();
        def.api_version = "1".to_string();
        assert!(validate_template(&def).is_err());
    }
}
