//! Merge error kinds

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("{role} is not a valid file: {}", path.display())]
    MissingInputFile { role: &'static str, path: PathBuf },

    #[error("Failed reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed parsing {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Failed writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Non-fatal: an adjustment was skipped because its anchor line was absent.
    #[error("{stage}: anchor line not found: {anchor}")]
    AnchorNotFound { stage: &'static str, anchor: String },
}

impl MergeError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, MergeError::AnchorNotFound { .. })
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            MergeError::MissingInputFile { path, .. }
            | MergeError::Read { path, .. }
            | MergeError::Parse { path, .. }
            | MergeError::Write { path, .. } => Some(path),
            MergeError::AnchorNotFound { .. } => None,
        }
    }

    pub fn parse(path: &Path, message: impl ToString) -> Self {
        MergeError::Parse { path: path.to_path_buf(), message: message.to_string() }
    }

    /// Write-stage failure for output that could not be rendered.
    pub fn render(path: &Path, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        MergeError::Write { path: path.to_path_buf(), source: io::Error::new(io::ErrorKind::InvalidData, err) }
    }
}
