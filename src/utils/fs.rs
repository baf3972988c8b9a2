//! Filesystem helpers.
//!
//! All writes in dashforge go through [`atomic_write`]: content lands in a
//! temporary file in the target directory, is synced, then renamed into
//! place. Readers never observe a half-written template or output document.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

/// Create a directory (and parents) if it does not exist.
///
/// Errors if the path exists but is not a directory.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        anyhow::bail!("path exists but is not a directory: {}", path.display());
    }
    Ok(())
}

/// Atomically write bytes to a file using write-then-rename.
///
/// The temporary file is created in the same directory as the target so the
/// final rename stays on one filesystem. Parent directories are created as
/// needed.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    ensure_dir(parent)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".dashforge-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;

    temp.write_all(content)
        .with_context(|| format!("failed to write temp file for {}", path.display()))?;
    temp.as_file().sync_all().context("failed to sync file to disk")?;

    temp.persist(path)
        .with_context(|| format!("failed to move temp file into place at {}", path.display()))?;
    Ok(())
}
