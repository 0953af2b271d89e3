// src/error.rs
use std::path::PathBuf;

use thiserror::Error;

/// Failures of the per-search state store.
#[derive(Error, Debug)]
pub enum StateError {
    /// The file exists but does not parse. The search is skipped; the file is left alone.
    #[error("corrupt state file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("state file {path} has unsupported version {found} (max {supported})")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        supported: u32,
    },

    #[error("writing state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serializing state: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StateError {
    /// True when the on-disk state must not be overwritten this cycle.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. } | Self::UnsupportedVersion { .. })
    }
}
