//! Moves a deployment's state blob between the resolved storage account and
//! its local mirror under the data directory.
//!
//! The blob lives in the container named after the workspace, under the
//! same file name as the local mirror. There is no lease or version check on
//! the remote blob: the last upload wins.

use std::io;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::cancel::run_cancellable;
use crate::coordinate::DeploymentCoordinate;
use crate::error::ErrorKind;
use crate::resolver::{StorageAccountFilter, resolve};
use crate::storage::{ResolvedAccount, StorageClient};
use crate::terraform::state::StatePaths;

pub struct StateSynchronizer<S> {
    storage: S,
    filter: StorageAccountFilter,
    container: String,
    paths: StatePaths,
    cancel: CancellationToken,
}

impl<S: StorageClient> StateSynchronizer<S> {
    pub fn new(
        storage: S,
        coordinate: &DeploymentCoordinate,
        paths: StatePaths,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            storage,
            filter: StorageAccountFilter::new(&coordinate.level, &coordinate.environment),
            container: coordinate.workspace.clone(),
            paths,
            cancel,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn key(&self) -> &str {
        self.paths.state_name()
    }

    pub fn local_path(&self) -> PathBuf {
        self.paths.state()
    }

    async fn account(&self) -> Result<ResolvedAccount, ErrorKind> {
        resolve(&self.storage, &self.filter, &self.cancel).await
    }

    async fn exists(&self, account: &ResolvedAccount) -> Result<bool, ErrorKind> {
        run_cancellable(
            &self.cancel,
            self.storage.blob_exists(account, &self.container, self.key()),
        )
        .await
    }

    /// Fetches the remote state into the local mirror and returns its path.
    ///
    /// Fails with [`ErrorKind::StateNotFound`] when the blob does not exist.
    /// A blob removed between the existence check and the fetch surfaces as
    /// a transport error.
    pub async fn download(&self) -> Result<PathBuf, ErrorKind> {
        let account = self.account().await?;

        if !self.exists(&account).await? {
            return Err(ErrorKind::StateNotFound {
                container: self.container.clone(),
                key: self.key().to_string(),
            });
        }

        let data = run_cancellable(
            &self.cancel,
            self.storage
                .download_blob(&account, &self.container, self.key()),
        )
        .await?;

        let dir = self.paths.dir();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ErrorKind::io(dir, e))?;

        let path = self.local_path();
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| ErrorKind::io(&path, e))?;

        tracing::info!(
            account = %account.name,
            container = %self.container,
            path = %path.display(),
            bytes = data.len(),
            "state downloaded"
        );
        Ok(path)
    }

    /// Pushes the local mirror to the remote blob, overwriting it.
    pub async fn upload(&self) -> Result<(), ErrorKind> {
        let path = self.local_path();
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ErrorKind::LocalStateMissing { path });
            }
            Err(e) => return Err(ErrorKind::io(&path, e)),
        };

        let account = self.account().await?;
        let bytes = data.len();
        run_cancellable(
            &self.cancel,
            self.storage
                .upload_blob(&account, &self.container, self.key(), data),
        )
        .await?;

        tracing::info!(
            account = %account.name,
            container = %self.container,
            path = %path.display(),
            bytes,
            "state uploaded"
        );
        Ok(())
    }

    /// Deletes the remote blob and its snapshots. Returns `false` when there
    /// was nothing to delete.
    pub async fn delete(&self) -> Result<bool, ErrorKind> {
        let account = self.account().await?;

        if !self.exists(&account).await? {
            tracing::debug!(
                container = %self.container,
                key = %self.key(),
                "no remote state to delete"
            );
            return Ok(false);
        }

        run_cancellable(
            &self.cancel,
            self.storage
                .delete_blob(&account, &self.container, self.key(), true),
        )
        .await?;

        tracing::info!(
            account = %account.name,
            container = %self.container,
            key = %self.key(),
            "remote state deleted"
        );
        Ok(true)
    }
}
