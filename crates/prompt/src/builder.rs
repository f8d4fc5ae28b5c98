//! Rendering of source profiles into prompt text.

use crate::types::SourceProfile;
use citeflow_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// A profile rendered for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedProfile {
    /// System message, when the profile defines one
    pub system: Option<String>,

    /// Preamble opening the augmented user message
    pub preamble: String,
}

/// Render a profile's preamble and system text.
///
/// Template variables: `title`, `tone`, `style` and `sourceCount`, plus any
/// entries in `extra`, which take precedence.
///
/// # Example
/// ```
/// use citeflow_prompt::{render_profile, SourceProfile};
/// use std::collections::HashMap;
///
/// let rendered = render_profile(&SourceProfile::default(), 2, HashMap::new()).unwrap();
/// assert!(rendered.preamble.contains("2 numbered sources"));
/// ```
pub fn render_profile(
    profile: &SourceProfile,
    source_count: usize,
    extra: HashMap<String, String>,
) -> AppResult<RenderedProfile> {
    tracing::debug!("Rendering profile: {}", profile.id);

    let mut variables = HashMap::new();
    variables.insert("title".to_string(), profile.title.clone());
    variables.insert("tone".to_string(), profile.behavior.tone.clone());
    variables.insert("style".to_string(), profile.behavior.style.clone());
    variables.insert("sourceCount".to_string(), source_count.to_string());
    variables.extend(extra);

    let preamble = render_template(&profile.preamble, &variables)?;
    let system = profile
        .system
        .as_deref()
        .map(|template| render_template(template, &variables))
        .transpose()?;

    Ok(RenderedProfile { system, preamble })
}

/// Render a Handlebars template with variables.
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Prompts are plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("profile", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("profile", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
