pub mod backend;
pub mod cleanup;
pub mod executor;
pub mod state;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

pub use executor::TerraformCli;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("terraform version {current} does not support {feature} (requires {required})")]
    VersionUnsupported {
        current: String,
        required: String,
        feature: String,
    },
    #[error("plan file not found: {}", .0.display())]
    PlanNotFound(PathBuf),
    #[error("state file not found: {}", .0.display())]
    StateNotFound(PathBuf),
    #[error("failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "terraform {command} exited with status {}",
        code.map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string())
    )]
    Failed { command: String, code: Option<i32> },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tool-execution capability. Each call runs one tool command to completion.
#[async_trait]
pub trait TerraformOperations: Send + Sync {
    async fn init(&self) -> Result<(), ExecutionError>;
    async fn plan(&self, destroy: bool) -> Result<(), ExecutionError>;
    async fn apply(&self) -> Result<(), ExecutionError>;
    async fn destroy(&self) -> Result<(), ExecutionError>;
    async fn show(&self) -> Result<(), ExecutionError>;
    async fn validate(&self) -> Result<(), ExecutionError>;
}
