mod auth;
mod client;
mod error;
mod types;

pub use client::{ARM_ENDPOINT, AzureClientOptions, AzureStorageClient};
pub use error::AzureError;
pub use types::AccountKey;

use async_trait::async_trait;

use super::{AccountPage, ResolvedAccount, StorageClient, StorageError};

#[async_trait]
impl StorageClient for AzureStorageClient {
    async fn list_accounts(
        &self,
        continuation: Option<String>,
    ) -> Result<AccountPage, StorageError> {
        Ok(self.list_accounts_page(continuation).await?)
    }

    async fn blob_exists(
        &self,
        account: &ResolvedAccount,
        container: &str,
        key: &str,
    ) -> Result<bool, StorageError> {
        Ok(AzureStorageClient::blob_exists(self, account, container, key).await?)
    }

    async fn upload_blob(
        &self,
        account: &ResolvedAccount,
        container: &str,
        key: &str,
        data: Vec<u8>,
    ) -> Result<(), StorageError> {
        tracing::debug!(
            account = %account.name,
            container,
            key,
            bytes = data.len(),
            "uploading blob"
        );
        Ok(AzureStorageClient::upload_blob(self, account, container, key, data).await?)
    }

    async fn download_blob(
        &self,
        account: &ResolvedAccount,
        container: &str,
        key: &str,
    ) -> Result<Vec<u8>, StorageError> {
        tracing::debug!(account = %account.name, container, key, "downloading blob");
        Ok(AzureStorageClient::download_blob(self, account, container, key).await?)
    }

    async fn delete_blob(
        &self,
        account: &ResolvedAccount,
        container: &str,
        key: &str,
        include_snapshots: bool,
    ) -> Result<(), StorageError> {
        tracing::debug!(
            account = %account.name,
            container,
            key,
            include_snapshots,
            "deleting blob"
        );
        Ok(AzureStorageClient::delete_blob(self, account, container, key, include_snapshots).await?)
    }
}
