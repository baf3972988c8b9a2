//! Command-line interface for dashforge.
//!
//! Two subcommands cover the two directions of the tool:
//!
//! - `build` renders the template library into output documents for every
//!   configured `(format, datasource, target)` combination.
//! - `convert` decomposes an existing dashboard document into the template
//!   library.
//!
//! Each command is its own module with its own argument struct and
//! `execute()` method; this file holds the root parser, the global
//! verbosity flags, and logging setup.

mod build;
mod convert;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Root CLI parser.
#[derive(Parser)]
#[command(
    name = "dashforge",
    about = "Build Grafana dashboards from templates, and convert dashboards back into templates",
    version,
    long_about = "dashforge renders parameterized dashboard documents from a library of reusable \
                  template fragments, and performs the inverse: decomposing an existing dashboard \
                  into that same fragment library."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build templates into output documents.
    Build(build::BuildCommand),

    /// Convert an existing dashboard (JSON or YAML) into templates.
    Convert(convert::ConvertCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        init_logging(self.verbose, self.quiet);
        match self.command {
            Commands::Build(cmd) => cmd.execute().await,
            Commands::Convert(cmd) => cmd.execute().await,
        }
    }
}

/// Initialize tracing output on stderr.
///
/// `--verbose` forces debug level, `--quiet` errors only; otherwise
/// `RUST_LOG` applies with a `warn` default.
fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("dashforge=debug")
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}
