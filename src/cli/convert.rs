//! `dashforge convert` — decompose a dashboard into the template library.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use crate::config;
use crate::decompose::decompose;
use crate::tree::{Format, Node};

/// Convert an existing dashboard document into templates.
///
/// Decomposition needs to know which literal values to parameterize, so the
/// datasource and label set must be supplied — either explicitly via
/// `--datasource`/`--labels`, or from a config file (first datasource, its
/// label list). Explicit flags win.
///
/// The fragment library is fully built and validated in memory before any
/// file is written: a failed conversion leaves the templates directory
/// untouched.
#[derive(Args, Debug)]
pub struct ConvertCommand {
    /// Path to the dashboard.json or dashboard.yml file.
    #[arg(long)]
    input: PathBuf,

    /// Templates directory path.
    #[arg(long, default_value = "templates")]
    templates: PathBuf,

    /// Config file supplying the datasource and label set.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Datasource literal to parameterize (overrides the config).
    #[arg(long)]
    datasource: Option<String>,

    /// Comma-separated label names to parameterize (overrides the config).
    #[arg(long, value_delimiter = ',')]
    labels: Vec<String>,
}

impl ConvertCommand {
    pub async fn execute(self) -> Result<()> {
        let (datasource, labels) = self.resolve_parameters()?;

        let format = self
            .input
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Format::from_extension)
            .with_context(|| {
                format!(
                    "unrecognized input extension for {} (expected .json, .yml, or .yaml)",
                    self.input.display()
                )
            })?;
        let text = std::fs::read_to_string(&self.input)
            .with_context(|| format!("failed to read {}", self.input.display()))?;
        let dashboard = Node::parse(&text, format)
            .with_context(|| format!("failed to parse {}", self.input.display()))?;

        let store = decompose(&dashboard, &datasource, &labels)?;
        store.save(&self.templates)?;

        println!(
            "{} converted {} -> {} ({} fragments)",
            "[✓]".green(),
            self.input.display(),
            self.templates.display(),
            store.len()
        );
        Ok(())
    }

    fn resolve_parameters(&self) -> Result<(String, Vec<String>)> {
        let config = match &self.config {
            Some(path) => Some(config::load_config(path)?),
            None => None,
        };
        let datasource = self
            .datasource
            .clone()
            .or_else(|| config.as_ref().and_then(|c| c.datasource.first().cloned()))
            .context(
                "convert needs the datasource to parameterize: pass --datasource or --config",
            )?;
        let labels = if self.labels.is_empty() {
            config.map(|c| c.labels).unwrap_or_default()
        } else {
            self.labels.clone()
        };
        Ok((datasource, labels))
    }
}
