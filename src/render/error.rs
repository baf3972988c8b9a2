//! Structured template error handling.
//!
//! Tera reports failures as a chain of string messages; this module parses
//! them into typed errors so the pipeline can tell an undefined name apart
//! from a syntax error (and, one level up, a dependency-order violation).
//! Undefined names come with did-you-mean suggestions ranked by Levenshtein
//! distance.

use std::fmt;

use strsim::levenshtein;

use crate::tree::Format;

/// Maximum Levenshtein distance for a suggestion, as a percentage of the
/// target name's length.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// A fragment failed to render.
#[derive(Debug)]
pub enum TemplateError {
    /// The template referenced a name the context does not define.
    VariableNotFound {
        /// Normalized dotted path, e.g. `rendered.targets.cpu_a`.
        variable: String,
        /// Closest defined paths, best first.
        suggestions: Vec<String>,
    },

    /// Malformed template syntax or a failed helper call.
    SyntaxError {
        message: String,
        /// 1-indexed line in the template source, when tera reports one.
        line: Option<usize>,
    },

    /// The rendered text does not parse in the fragment's declared format.
    InvalidOutput { format: Format, message: String },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::VariableNotFound {
                variable,
                suggestions,
            } => {
                write!(f, "undefined name '{variable}'")?;
                if !suggestions.is_empty() {
                    write!(f, " (did you mean {}?)", suggestions.join(", "))?;
                }
                Ok(())
            }
            TemplateError::SyntaxError { message, line } => {
                write!(f, "template syntax error")?;
                if let Some(line) = line {
                    write!(f, " at line {line}")?;
                }
                write!(f, ": {message}")
            }
            TemplateError::InvalidOutput { format, message } => {
                write!(f, "rendered output is not valid {format}: {message}")
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// Normalize a tera variable reference to a dotted path.
///
/// Tera reports whichever syntax the template used, so
/// `rendered["panels"]["cpu"]` and `rendered.panels.cpu` both normalize to
/// the latter.
pub fn normalize_variable_path(raw: &str) -> String {
    let mut path = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '[' => path.push('.'),
            ']' | '"' | '\'' => {}
            _ => path.push(ch),
        }
    }
    path
}

/// Rank `available` names by edit distance to `target`, returning up to
/// three within the similarity threshold.
pub fn find_similar(target: &str, available: &[String]) -> Vec<String> {
    let mut scored: Vec<_> =
        available.iter().map(|name| (name.clone(), levenshtein(target, name))).collect();
    scored.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    scored
        .into_iter()
        .filter(|(_, dist)| *dist <= target.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
        .take(3)
        .map(|(name, _)| name)
        .collect()
}
