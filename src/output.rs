//! Output assembler.
//!
//! Serializes build artifacts and places them under the layout contract
//!
//! ```text
//! output/<format>/<datasource>/<target>/<name>.<ext>
//! ```
//!
//! Intermediate directories are created on demand and every file is written
//! atomically (temp file + rename), so a crashed or aborted build never
//! leaves a half-written document — though an aborted datasource's directory
//! may hold a subset of its files and should be discarded wholesale.

use std::path::PathBuf;

use crate::core::Error;
use crate::pipeline::BuildArtifact;
use crate::utils;

/// Writes rendered documents to their deterministic output paths.
pub struct OutputAssembler {
    root: PathBuf,
}

impl OutputAssembler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The output path for an artifact.
    pub fn path_for(&self, artifact: &BuildArtifact) -> PathBuf {
        self.root
            .join(artifact.format.extension())
            .join(&artifact.datasource)
            .join(artifact.target.name())
            .join(format!("{}.{}", artifact.name, artifact.format.extension()))
    }

    /// Serialize and write one artifact, returning the path written.
    pub fn write(&self, artifact: &BuildArtifact) -> Result<PathBuf, Error> {
        let path = self.path_for(artifact);
        let text = artifact.node.to_text(artifact.format)?;
        utils::fs::atomic_write(&path, text.as_bytes()).map_err(|e| Error::Write {
            path: path.clone(),
            message: format!("{e:#}"),
        })?;
        tracing::debug!("wrote {}", path.display());
        Ok(path)
    }
}
