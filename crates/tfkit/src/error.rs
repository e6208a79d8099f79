//! Error types for terraform operations.

use std::io;
use std::path::{Path, PathBuf};

/// Result type alias for terraform operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Appended to failures when terraform output was not echoed.
pub const REDACTED_NOTICE: &str =
    "Some output has been redacted, use `bbl latest-error` to see it or run again with --debug";

/// Errors that can occur while driving terraform.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Neither an embedded binary nor `terraform` on PATH.
    #[error("terraform binary not found: none embedded and none on PATH")]
    BinaryNotFound,

    /// The embedded binary could not be decompressed.
    #[error("failed to extract terraform: {0}")]
    Extract(String),

    /// Terraform could not be started.
    #[error("failed to run terraform {command}: {source}")]
    Spawn {
        /// Subcommand, e.g. `apply`
        command: String,
        #[source]
        source: io::Error,
    },

    /// Terraform exited unsuccessfully.
    #[error("{}", failure_message(command, *code, *redacted))]
    Failed {
        /// Subcommand, e.g. `apply`
        command: String,
        /// Exit code, if terraform exited normally
        code: Option<i32>,
        /// Whether output was hidden from the terminal
        redacted: bool,
    },

    /// `terraform apply` failed. `tf_state` is the state left behind.
    #[error("{underlying}")]
    Apply {
        /// Contents of `terraform.tfstate` after the failure
        tf_state: String,
        underlying: Box<Error>,
    },

    /// `terraform destroy` failed. `tf_state` is the state left behind.
    #[error("{underlying}")]
    Destroy {
        /// Contents of `terraform.tfstate` after the failure
        tf_state: String,
        underlying: Box<Error>,
    },

    /// Terraform is too old.
    #[error("terraform version must be at least v{minimum}, found v{found}")]
    Version {
        found: String,
        minimum: String,
    },

    /// `terraform version` printed something unexpected.
    #[error("could not determine terraform version from {0:?}")]
    UnknownVersion(String),

    /// The state has no IaaS yet.
    #[error("an iaas must be configured before running terraform")]
    NoIaas,

    /// Load balancers requested on an IaaS without templates for them.
    #[error("load balancers are not supported on {iaas}")]
    LbUnsupported {
        iaas: statekit::Iaas,
    },

    /// A required terraform output is missing.
    #[error("missing terraform output: {0}")]
    MissingOutput(String),

    /// `terraform output -json` was not valid JSON.
    #[error("failed to parse terraform outputs: {0}")]
    Outputs(#[source] serde_json::Error),

    /// tfvars could not be rendered.
    #[error("failed to render tfvars: {0}")]
    Hcl(#[from] hcl::Error),

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

fn failure_message(command: &str, code: Option<i32>, redacted: bool) -> String {
    let status = code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}"));
    let mut message = format!("terraform {command} exited with {status}");
    if redacted {
        message.push('\n');
        message.push_str(REDACTED_NOTICE);
    }
    message
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Terraform state left behind by a failed apply or destroy.
    pub fn tf_state(&self) -> Option<&str> {
        match self {
            Self::Apply { tf_state, .. } | Self::Destroy { tf_state, .. } => Some(tf_state),
            _ => None,
        }
    }

    /// Whether the failure came from terraform itself rather than bbl.
    pub fn is_tool_failure(&self) -> bool {
        match self {
            Self::Failed { .. } | Self::Spawn { .. } => true,
            Self::Apply { underlying, .. } | Self::Destroy { underlying, .. } => {
                underlying.is_tool_failure()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_failure_message() {
        let err = Error::Failed {
            command: "apply".to_string(),
            code: Some(1),
            redacted: true,
        };
        assert_eq!(
            err.to_string(),
            format!("terraform apply exited with status 1\n{REDACTED_NOTICE}")
        );
    }

    #[test]
    fn test_debug_failure_message_is_plain() {
        let err = Error::Failed {
            command: "destroy".to_string(),
            code: None,
            redacted: false,
        };
        assert_eq!(err.to_string(), "terraform destroy exited with a signal");
    }

    #[test]
    fn test_apply_error_keeps_state() {
        let err = Error::Apply {
            tf_state: "half-done".to_string(),
            underlying: Box::new(Error::Failed {
                command: "apply".to_string(),
                code: Some(1),
                redacted: false,
            }),
        };
        assert_eq!(err.tf_state(), Some("half-done"));
        assert!(err.is_tool_failure());
        assert_eq!(err.to_string(), "terraform apply exited with status 1");
    }
}
