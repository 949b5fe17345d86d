//! Error types for bundle creation
//!
//! `BundleError` covers every failure that aborts a run. `ToolError` is what
//! a [`CopyTool`](crate::copy::CopyTool) reports; the orchestrator wraps it
//! into the matching `BundleError` variant together with the references
//! involved.

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the crate
pub type BundleResult<T> = Result<T, BundleError>;

#[derive(Error, Debug)]
pub enum BundleError {
    /// A `--platform` value did not match `<os>/<arch>[/<variant>]`
    #[error("invalid platform {0:?}: required format is <os>/<arch>[/<variant>]")]
    InvalidPlatformFormat(String),

    /// The images file could not be read or parsed
    #[error("failed to parse images config {}: {reason}", .path.display())]
    ConfigParse { path: PathBuf, reason: String },

    /// The staging registry failed to start or stopped serving
    #[error("staging registry error: {0}")]
    RegistryStartup(String),

    #[error("failed to log in to registry {registry}: {source}")]
    Login {
        registry: String,
        #[source]
        source: ToolError,
    },

    #[error("failed to inspect {reference}: {source}")]
    Inspect {
        reference: String,
        #[source]
        source: ToolError,
    },

    #[error("failed to copy {src} to {dst}: {source}")]
    Copy {
        src: String,
        dst: String,
        #[source]
        source: ToolError,
    },

    #[error("failed to publish manifest list to {dst}: {source}")]
    ManifestPublish {
        dst: String,
        #[source]
        source: ToolError,
    },

    #[error("{} already exists: specify --overwrite to overwrite existing file", .0.display())]
    OutputExists(PathBuf),

    #[error("failed to create image bundle tarball {}: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to extract image bundle {}: {source}", .path.display())]
    Extract {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("required binary {name} not found: {reason}")]
    ToolNotFound { name: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BundleError {
    /// Process exit code for this failure. A staging registry that cannot be
    /// started or stops serving exits with 2, everything else with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            BundleError::RegistryStartup(_) => 2,
            _ => 1,
        }
    }
}

/// Failure reported by an external copy tool invocation
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and exited unsuccessfully
    #[error("{program} exited with {status}")]
    Failed {
        program: String,
        status: String,
        output: Vec<u8>,
    },

    #[error("unexpected manifest: {0}")]
    InvalidManifest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Captured diagnostic output of the failed invocation, if any
    pub fn output(&self) -> &[u8] {
        match self {
            ToolError::Failed { output, .. } => output,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_exists_message() {
        let err = BundleError::OutputExists(PathBuf::from("images.tar"));
        assert_eq!(
            err.to_string(),
            "images.tar already exists: specify --overwrite to overwrite existing file"
        );
    }

    #[test]
    fn test_exit_code() {
        assert_eq!(
            BundleError::RegistryStartup("registry exited".to_string()).exit_code(),
            2
        );
        assert_eq!(BundleError::OutputExists(PathBuf::from("images.tar")).exit_code(), 1);
    }

    #[test]
    fn test_tool_error_output() {
        let err = ToolError::Failed {
            program: "skopeo".to_string(),
            status: "exit status: 1".to_string(),
            output: b"manifest unknown".to_vec(),
        };
        assert_eq!(err.output(), b"manifest unknown");
        assert!(err.to_string().contains("exit status: 1"));

        let err = ToolError::InvalidManifest("not json".to_string());
        assert!(err.output().is_empty());
    }
}
