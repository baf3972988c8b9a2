//! Error handling for dashforge.
//!
//! One strongly-typed error enum covers every failure mode of the build and
//! convert pipelines. Each variant names the offending fragment, category,
//! or path so that a failed build always tells you which template in which
//! category broke, and why — nothing is silently swallowed.

use std::path::PathBuf;

use thiserror::Error;

use crate::render::TemplateError;
use crate::store::Category;

/// The main error type for build and convert operations.
#[derive(Error, Debug)]
pub enum Error {
    /// An input document (dashboard, config, rendered fragment output) is
    /// malformed.
    #[error("failed to parse {context}: {message}")]
    Parse {
        /// What was being parsed (e.g. "json document").
        context: String,
        message: String,
    },

    /// A tree could not be serialized. Practically unreachable for
    /// well-formed trees; kept explicit so it is never silently swallowed.
    #[error("failed to serialize {context}: {message}")]
    Serialize { context: String, message: String },

    /// A fragment failed to render: undefined name, malformed template
    /// syntax, or output that does not parse in the fragment's format.
    #[error("template error in {category}/{name}: {source}")]
    Template {
        category: Category,
        name: String,
        #[source]
        source: TemplateError,
    },

    /// A fragment referenced a category that renders later in the fixed
    /// pipeline order.
    #[error(
        "fragment {category}/{name} references '{reference}' in category '{referenced}', \
         which renders later in the pipeline"
    )]
    Dependency {
        /// Category of the offending fragment.
        category: Category,
        /// Name of the offending fragment.
        name: String,
        /// The referenced variable path as written in the template.
        reference: String,
        /// The too-late category being referenced.
        referenced: Category,
    },

    /// Decomposition derived the same name for two structurally different
    /// subtrees in the same category.
    #[error("name collision in {category}: two different subtrees both derive the name '{name}'")]
    NameCollision { category: Category, name: String },

    /// Two template files map to the same `(category, name)`.
    #[error(
        "duplicate fragment {}/{}: defined by both {} and {}",
        category,
        name,
        first.display(),
        second.display()
    )]
    FragmentConflict {
        category: Category,
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// An output or template file could not be written.
    #[error("failed to write {}: {}", path.display(), message)]
    Write { path: PathBuf, message: String },

    /// The config's `target` list names a category that does not exist.
    #[error("unknown target category '{0}'")]
    UnknownCategory(String),

    /// Template directory traversal failed.
    #[error("failed to read template directory {}: {}", path.display(), message)]
    TemplateDir { path: PathBuf, message: String },

    /// A worker task died unexpectedly (panic in a render worker).
    #[error("internal error: {0}")]
    Internal(String),
}
