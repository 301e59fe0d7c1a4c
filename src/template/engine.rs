//! Markup rendering on Tera.

use std::error::Error as _;

use tera::{Context, Tera};

use super::types::{Bindings, ParameterSet, TemplateError, TemplateResult};

/// Name the markup is registered under; the `.html` suffix turns on autoescaping
const MARKUP_TEMPLATE_NAME: &str = "markup.html";

/// Renders a markup payload with validated bindings
pub trait RenderEngine: Send + Sync {
    /// Check that markup parses, before anything is stored
    fn compile(&self, markup: &str) -> TemplateResult<()>;

    /// Render markup. `declared` is the template's parameter set; bindings
    /// have already passed the contract check against it.
    fn render(
        &self,
        markup: &str,
        declared: &ParameterSet,
        bindings: &Bindings,
    ) -> TemplateResult<String>;
}

/// Tera-backed engine. Markup uses Tera syntax (`{{ name }}`), substituted
/// values are HTML-escaped, and declared optional parameters that were not
/// supplied render as the empty string.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeraRenderEngine;

impl TeraRenderEngine {
    pub fn new() -> Self {
        Self
    }

    fn load(markup: &str) -> Result<Tera, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_template(MARKUP_TEMPLATE_NAME, markup)?;
        Ok(tera)
    }
}

impl RenderEngine for TeraRenderEngine {
    fn compile(&self, markup: &str) -> TemplateResult<()> {
        Self::load(markup)
            .map(|_| ())
            .map_err(|e| TemplateError::InvalidMarkup(describe(&e)))
    }

    fn render(
        &self,
        markup: &str,
        declared: &ParameterSet,
        bindings: &Bindings,
    ) -> TemplateResult<String> {
        let mut context = Context::new();
        for (key, value) in bindings {
            context.insert(key.as_str(), value);
        }

        // Optional parameters the caller left out still resolve
        for parameter in declared.iter() {
            if !bindings.contains_key(&parameter.name) {
                context.insert(parameter.name.as_str(), "");
            }
        }

        Self::load(markup)
            .and_then(|tera| tera.render(MARKUP_TEMPLATE_NAME, &context))
            .map_err(|e| TemplateError::Internal(format!("render failed: {}", describe(&e))))
    }
}

/// Tera keeps the useful detail in the source chain
fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
