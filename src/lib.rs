//! Rover - remote state management for landing-zone deployments
//!
//! Locates the storage account tagged for a deployment level and
//! environment, keeps a local mirror of the remote state in sync around each
//! tool invocation, and writes version-appropriate backend configuration.

pub mod config;
pub mod coordinate;
pub mod error;
pub mod manager;
pub mod resolver;
pub mod storage;
pub mod sync;
pub mod terraform;

mod cancel;

pub use config::{
    BackendKind, BackendSpec, ConfigError, RoverConfig, RoverSettings, ToolVersion, UploadPolicy,
};
pub use coordinate::DeploymentCoordinate;
pub use error::{ErrorKind, RoverError};
pub use manager::StateManager;
pub use resolver::StorageAccountFilter;
pub use storage::{AzureStorageClient, InMemoryStorage, StorageClient, StorageError};
pub use sync::StateSynchronizer;
pub use terraform::{ExecutionError, TerraformCli, TerraformOperations};
