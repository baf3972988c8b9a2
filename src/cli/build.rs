//! `dashforge build` — render the template library into output documents.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config;
use crate::output::OutputAssembler;
use crate::pipeline;
use crate::render::{RendererConfig, TemplateRenderer};
use crate::store::FragmentStore;

/// Build templates into output documents.
///
/// For every datasource in the config, renders all template categories in
/// dependency order, then writes one document per
/// `(format, datasource, target, fragment)` under the output directory.
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Configuration file path.
    #[arg(long, default_value = "config.yml")]
    config: PathBuf,

    /// Templates directory path.
    #[arg(long, default_value = "templates")]
    templates: PathBuf,

    /// Output directory path.
    #[arg(long, default_value = "output")]
    output: PathBuf,

    /// Maximum number of datasources rendered concurrently
    /// (defaults to the number of CPUs).
    #[arg(long)]
    max_parallel: Option<usize>,
}

impl BuildCommand {
    pub async fn execute(self) -> Result<()> {
        let config = config::load_config(&self.config)?;
        let store = FragmentStore::load(&self.templates)?;
        if store.is_empty() {
            tracing::warn!("no templates found under {}", self.templates.display());
        }
        tracing::info!(
            "building {} fragments for {} datasource(s)",
            store.len(),
            config.datasource.len()
        );

        let datasource_count = config.datasource.len();
        let max_parallel = self.max_parallel.unwrap_or_else(|| {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        });

        let bar = ProgressBar::new(datasource_count as u64);
        bar.set_style(ProgressStyle::with_template(
            "{spinner} [{bar:30}] {pos}/{len} datasources",
        )?);

        let report = pipeline::build(
            Arc::new(store),
            Arc::new(config),
            Arc::new(TemplateRenderer::new(RendererConfig::default())),
            max_parallel,
            Some(bar.clone()),
        )
        .await?;
        bar.finish_and_clear();

        let assembler = OutputAssembler::new(&self.output);
        for artifact in &report.artifacts {
            let path = assembler.write(artifact)?;
            println!("{} saved {}", "[✓]".green(), path.display());
        }

        for (datasource, error) in &report.failures {
            eprintln!("{} datasource {}: {error}", "[✗]".red(), datasource.bold());
        }
        if !report.failures.is_empty() {
            anyhow::bail!(
                "build failed for {} of {datasource_count} datasource(s)",
                report.failures.len()
            );
        }

        println!("{} build completed", "✓".green());
        Ok(())
    }
}
