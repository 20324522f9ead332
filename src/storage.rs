pub mod azure;
pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub use azure::AzureStorageClient;
pub use memory::InMemoryStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("azure error: {0}")]
    Azure(String),
    #[error("blob not found: {container}/{key}")]
    BlobNotFound { container: String, key: String },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Tag values may be present with no value, hence the `Option`.
pub type Tags = HashMap<String, Option<String>>;

/// One entry from the account listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StorageAccount {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub tags: Option<Tags>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AccountPage {
    pub accounts: Vec<StorageAccount>,
    /// Opaque continuation handed back to `list_accounts`; `None` on the last page.
    pub next: Option<String>,
}

/// The single storage account that holds a coordinate's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccount {
    pub name: String,
    pub resource_group: String,
}

/// Object-storage capability consumed by the resolver and synchronizer.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn list_accounts(&self, continuation: Option<String>)
    -> Result<AccountPage, StorageError>;

    async fn blob_exists(
        &self,
        account: &ResolvedAccount,
        container: &str,
        key: &str,
    ) -> Result<bool, StorageError>;

    async fn upload_blob(
        &self,
        account: &ResolvedAccount,
        container: &str,
        key: &str,
        data: Vec<u8>,
    ) -> Result<(), StorageError>;

    async fn download_blob(
        &self,
        account: &ResolvedAccount,
        container: &str,
        key: &str,
    ) -> Result<Vec<u8>, StorageError>;

    async fn delete_blob(
        &self,
        account: &ResolvedAccount,
        container: &str,
        key: &str,
        include_snapshots: bool,
    ) -> Result<(), StorageError>;
}
