//! Build configuration document.
//!
//! A YAML document drives the cross-product of build invocations:
//!
//! ```yaml
//! output_format: [json, yaml]
//! datasource: [prometheus, influxdb]
//! labels: [host, env]
//! target: [dashboards]
//! ```
//!
//! The config is the pipeline's external driver, not part of its state
//! machine — one `(datasource)` pipeline run per datasource entry, one
//! emitted document per `(format, datasource, target, fragment)`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::Error;
use crate::store::Category;
use crate::tree::Format;

/// Parsed build configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildConfig {
    /// Output formats to emit, in order.
    #[serde(default)]
    pub output_format: Vec<Format>,
    /// Datasources to build, in order. Each gets its own pipeline run.
    #[serde(default)]
    pub datasource: Vec<String>,
    /// Label names available to templates (selector generation).
    #[serde(default)]
    pub labels: Vec<String>,
    /// Categories whose fragments become output documents.
    #[serde(default)]
    pub target: Vec<String>,
}

impl BuildConfig {
    /// Resolve the `target` names to categories.
    pub fn target_categories(&self) -> Result<Vec<Category>, Error> {
        self.target
            .iter()
            .map(|name| {
                Category::from_name(name).ok_or_else(|| Error::UnknownCategory(name.clone()))
            })
            .collect()
    }
}

/// Load a build config file with file-path error context.
pub fn load_config(path: &Path) -> Result<BuildConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: BuildConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    if config.datasource.is_empty() {
        tracing::warn!("config {} declares no datasources; nothing to build", path.display());
    }
    if config.output_format.is_empty() {
        tracing::warn!("config {} declares no output formats; nothing will be written", path.display());
    }
    Ok(config)
}
