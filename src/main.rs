//! dashforge CLI entry point.
//!
//! Parses arguments, runs the selected command, and turns failures into a
//! readable error line and a non-zero exit code.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use dashforge::cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            std::process::exit(1);
        }
    }
}
