use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::storage::StorageError;
use crate::terraform::ExecutionError;

/// What went wrong, independent of where it happened.
#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("no storage account found matching level '{level}' and environment '{environment}'")]
    Resolution { level: String, environment: String },

    #[error("resource group not found in account ID: {id}")]
    ResourceGroup { id: String },

    #[error(transparent)]
    Transport(#[from] StorageError),

    #[error("state file does not exist: {container}/{key}")]
    StateNotFound { container: String, key: String },

    #[error("local state file not found: {}", path.display())]
    LocalStateMissing { path: PathBuf },

    #[error("failed to write backend config {}: {source}", path.display())]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cleanup errors:\n{}", errors.join("\n"))]
    Cleanup { errors: Vec<String> },

    #[error("terraform version {current} does not support {feature} (requires {required})")]
    VersionUnsupported {
        current: String,
        required: String,
        feature: String,
    },

    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ErrorKind {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<ExecutionError> for ErrorKind {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::VersionUnsupported {
                current,
                required,
                feature,
            } => ErrorKind::VersionUnsupported {
                current,
                required,
                feature,
            },
            other => ErrorKind::ToolExecution(other.to_string()),
        }
    }
}

/// An [`ErrorKind`] annotated with the operation, path and tool version it
/// surfaced under. This is the only error type the state manager returns.
#[derive(Debug, Error)]
#[error("{operation} failed (version {version}) at {}: {kind}", path.display())]
pub struct RoverError {
    pub operation: String,
    pub path: PathBuf,
    pub version: String,
    #[source]
    pub kind: ErrorKind,
}

impl RoverError {
    pub fn new(
        operation: impl Into<String>,
        path: &Path,
        version: impl Into<String>,
        kind: ErrorKind,
    ) -> Self {
        Self {
            operation: operation.into(),
            path: path.to_path_buf(),
            version: version.into(),
            kind,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}
