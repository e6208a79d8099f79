//! Error types for create-env and director operations.

use std::io;
use std::path::{Path, PathBuf};

/// Result type alias for boshkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running create-env or talking to a director.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A script template failed to render.
    #[error("failed to render {name}: {source}")]
    Template {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    /// A YAML file could not be read or written.
    #[error("invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A script could not be started.
    #[error("failed to run {script}: {source}")]
    Spawn {
        script: String,
        #[source]
        source: io::Error,
    },

    /// A create-env or delete-env script exited unsuccessfully.
    #[error("{script} exited with {}{}", status_text(*code), detail_text(detail))]
    Script {
        script: String,
        code: Option<i32>,
        /// Tail of the script's stderr when output was not echoed
        detail: String,
    },

    /// The bosh CLI exited unsuccessfully.
    #[error("bosh {command} exited with {}{}", status_text(*code), detail_text(detail))]
    Director {
        command: String,
        code: Option<i32>,
        detail: String,
    },

    /// `bosh update-cloud-config` failed.
    #[error("failed to update cloud-config: {0}")]
    CloudConfig(#[source] Box<Error>),

    /// `bosh update-runtime-config` failed.
    #[error("failed to update runtime-config: {0}")]
    RuntimeConfig(#[source] Box<Error>),

    /// The state has no IaaS, so no ops generator can be chosen.
    #[error("an iaas must be configured before generating bosh configuration")]
    NoIaas,

    /// A value expected in a vars-store is missing.
    #[error("{key} not found in {}", path.display())]
    MissingVar { key: String, path: PathBuf },

    /// The `internal_cidr` output cannot hold a bosh network.
    #[error("invalid internal cidr {0:?}, expected an IPv4 network of /24 or larger")]
    InvalidCidr(String),

    /// The director has not been deployed yet.
    #[error("director has not been deployed; run `bbl up` first")]
    NoDirector,

    /// A terraform output could not be read.
    #[error(transparent)]
    Terraform(#[from] tfkit::Error),

    /// State directory error.
    #[error(transparent)]
    State(#[from] statekit::Error),

    /// IO error during file operations.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn status_text(code: Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}"))
}

fn detail_text(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(":\n{detail}")
    }
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a YAML error with path context.
    pub fn yaml(path: impl AsRef<Path>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether the failure came from an external tool rather than bbl.
    pub fn is_tool_failure(&self) -> bool {
        match self {
            Self::Script { .. } | Self::Director { .. } | Self::Spawn { .. } => true,
            Self::CloudConfig(inner) | Self::RuntimeConfig(inner) => inner.is_tool_failure(),
            Self::Terraform(e) => e.is_tool_failure(),
            _ => false,
        }
    }
}
