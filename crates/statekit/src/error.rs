//! Error types for state directory operations.
//!
//! Schema errors carry the exact remedial text shown to operators, so their
//! `Display` output is part of the user-visible contract.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for state operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading, writing or migrating state.
#[derive(Debug, Error)]
pub enum Error {
    /// The state file predates schema version 3 and cannot be migrated.
    #[error(
        "Existing bbl environment is incompatible with bbl v3. Create a new environment with v3 to continue."
    )]
    Incompatible,

    /// The state file was written by a newer bbl.
    #[error(
        "Existing bbl environment was created with a newer version of bbl. Please upgrade to bbl v{bbl_version}."
    )]
    UpgradeRequired {
        /// Version of bbl that wrote the state file
        bbl_version: String,
    },

    /// The state directory itself is missing.
    #[error("state directory does not exist: {}", .0.display())]
    StateDirMissing(PathBuf),

    /// A layout path exists but is not a directory.
    #[error("{} exists and is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// IO error during file operations.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        /// Path involved in the error
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// The state file is not valid JSON for the state document.
    #[error("failed to parse state file {}: {source}", path.display())]
    Parse {
        /// Path of the state file
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// The state document could not be serialized.
    #[error("failed to serialize state: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Walking the state directory failed.
    #[error("failed to walk state directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// A migration step failed. `step` is the stable prefix for the step.
    #[error("{step}: {source}")]
    Migration {
        /// Stable human-readable step prefix, e.g. `migrating terraform state`
        step: &'static str,
        /// What went wrong inside the step
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Wrap an error with a migration step prefix.
    pub fn migration(step: &'static str, source: Self) -> Self {
        Self::Migration {
            step,
            source: Box::new(source),
        }
    }

    /// Whether this error is a schema-version refusal.
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Incompatible | Self::UpgradeRequired { .. })
    }
}
