//! Prompt loading and rendering
//!
//! Loads prompt templates from an optional override directory or falls back
//! to embedded defaults.

use std::path::PathBuf;

use eyre::{eyre, Result};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

pub mod embedded;

/// Known template names
const TEMPLATES: [(&str, &str); 4] = [
    ("intake-extract", embedded::INTAKE_EXTRACT),
    ("intake-extract-strict", embedded::INTAKE_EXTRACT_STRICT),
    ("clarify", embedded::CLARIFY),
    ("poi-generate", embedded::POI_GENERATE),
];

/// Loads and renders prompt templates
pub struct PromptLoader {
    hbs: Handlebars<'static>,
}

impl PromptLoader {
    /// Create a loader with embedded defaults, applying overrides from
    /// `override_dir/<name>.hbs` when present.
    pub fn new(override_dir: Option<PathBuf>) -> Result<Self> {
        let mut hbs = Handlebars::new();
        hbs.set_strict_mode(false);

        for (name, default_template) in TEMPLATES {
            let template = override_dir
                .as_ref()
                .map(|dir| dir.join(format!("{name}.hbs")))
                .filter(|path| path.exists())
                .and_then(|path| {
                    debug!(name, path = %path.display(), "loading prompt override");
                    std::fs::read_to_string(path).ok()
                })
                .unwrap_or_else(|| default_template.to_string());

            hbs.register_template_string(name, template)
                .map_err(|e| eyre!("invalid prompt template '{}': {}", name, e))?;
        }

        Ok(Self { hbs })
    }

    /// Render a template by name with the given context
    pub fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<String> {
        self.hbs
            .render(name, context)
            .map_err(|e| eyre!("failed to render prompt '{}': {}", name, e))
    }
}

impl Default for PromptLoader {
    fn default() -> Self {
        Self::new(None).expect("embedded templates are valid")
    }
}
