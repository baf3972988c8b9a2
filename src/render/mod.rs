//! Template rendering engine.
//!
//! Wraps tera with the builder's expression delimiters and helper functions.
//! Dashboard documents natively use `{{ }}` (Grafana variable interpolation
//! in legends and links), so templates use a distinct `@{ }@` pair for
//! builder expressions. Rendering happens in three reversible text passes:
//!
//! 1. protect every native `{{` / `}}` with a sentinel token,
//! 2. translate the configured `@{` / `}@` delimiters to tera's `{{` / `}}`
//!    and render,
//! 3. restore the sentinels.
//!
//! Block tags (`{% if %}`, `{% for %}`) are left untouched and work as
//! normal tera; only the expression delimiters are remapped.
//!
//! There is no process-global engine state: delimiters live in a
//! [`RendererConfig`], helpers are registered on a fresh `Tera` per render
//! (an empty instance is just a couple of maps), so concurrent pipeline runs
//! cannot interfere with each other.

pub mod error;
pub mod filters;

use regex::Regex;
use tera::Tera;

pub use error::TemplateError;

use crate::pipeline::Context;
use crate::store::Fragment;
use crate::tree::Node;

/// Sentinels standing in for native `{{` / `}}` during rendering.
const NATIVE_OPEN: &str = "__DASHFORGE_NATIVE_OPEN__";
const NATIVE_CLOSE: &str = "__DASHFORGE_NATIVE_CLOSE__";

/// Renderer configuration: the expression delimiter pair.
///
/// Constructed per renderer and passed along explicitly — changing the
/// delimiters for one pipeline run can never leak into another.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub expr_open: String,
    pub expr_close: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            expr_open: "@{".to_string(),
            expr_close: "}@".to_string(),
        }
    }
}

/// Evaluates fragment sources against a pipeline context.
///
/// Rendering is pure: the same `(fragment, context)` pair always yields the
/// same tree, and nothing outside the context is read.
pub struct TemplateRenderer {
    config: RendererConfig,
}

impl TemplateRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Render one fragment to a document tree.
    pub fn render(&self, fragment: &Fragment, context: &Context) -> Result<Node, TemplateError> {
        let text = self.render_source(&fragment.source, context)?;
        Node::parse(&text, fragment.format).map_err(|e| TemplateError::InvalidOutput {
            format: fragment.format,
            message: e.to_string(),
        })
    }

    /// Render template source text without parsing the result.
    pub fn render_source(
        &self,
        source: &str,
        context: &Context,
    ) -> Result<String, TemplateError> {
        let protected = protect_native(source);
        let translated = protected
            .replace(&self.config.expr_open, "{{")
            .replace(&self.config.expr_close, "}}");

        let mut tera = Tera::default();
        filters::register(&mut tera);

        let tera_context = context.to_tera();
        let rendered = tera
            .render_str(&translated, &tera_context)
            .map_err(|e| classify_tera_error(&e, context))?;

        Ok(restore_native(&rendered))
    }
}

fn protect_native(source: &str) -> String {
    source.replace("{{", NATIVE_OPEN).replace("}}", NATIVE_CLOSE)
}

fn restore_native(rendered: &str) -> String {
    rendered.replace(NATIVE_OPEN, "{{").replace(NATIVE_CLOSE, "}}")
}

/// Parse a tera error chain into a structured [`TemplateError`].
fn classify_tera_error(error: &tera::Error, context: &Context) -> TemplateError {
    let line = extract_line(error);

    // Walk the chain; the undefined-variable message is usually a source of
    // the top-level "failed to render" wrapper.
    let mut messages = vec![error.to_string()];
    let mut current: Option<&dyn std::error::Error> = std::error::Error::source(error);
    while let Some(err) = current {
        messages.push(err.to_string());
        current = err.source();
    }

    for message in &messages {
        if let Some(variable) = extract_variable_name(message) {
            let variable = error::normalize_variable_path(&variable);
            let available = context.variable_paths();
            let suggestions = error::find_similar(&variable, &available);
            return TemplateError::VariableNotFound {
                variable,
                suggestions,
            };
        }
    }

    TemplateError::SyntaxError {
        message: format_tera_error(&messages),
        line,
    }
}

/// Extract the name from tera's "Variable `foo` not found" messages.
fn extract_variable_name(message: &str) -> Option<String> {
    let re = Regex::new(r"Variable `([^`]+)` not found").ok()?;
    re.captures(message).and_then(|caps| caps.get(1)).map(|m| m.as_str().to_string())
}

/// Extract a line number from tera's `line:column` error annotations.
fn extract_line(error: &tera::Error) -> Option<usize> {
    let debug = format!("{error:?}");
    let re = Regex::new(r"(\d+):(\d+)").ok()?;
    re.captures(&debug).and_then(|caps| caps.get(1)).and_then(|m| m.as_str().parse().ok())
}

/// Join the error chain into one message, stripping tera's internal
/// one-off template name.
fn format_tera_error(messages: &[String]) -> String {
    let cleaned: Vec<String> = messages
        .iter()
        .map(|msg| {
            msg.replace("Failed to render '__tera_one_off'", "rendering failed")
                .replace("Failed to parse '__tera_one_off'", "invalid syntax")
                .replace("'__tera_one_off'", "template")
                .trim()
                .to_string()
        })
        .filter(|msg| !msg.is_empty())
        .collect();
    if cleaned.is_empty() {
        "template rendering failed".to_string()
    } else {
        cleaned.join(": ")
    }
}
