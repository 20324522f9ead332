//! The externally visible verbs.
//!
//! Each verb is a fixed sequence of cleanup, backend generation and state
//! sync steps around exactly one delegated tool call. The first failing step
//! ends the verb; nothing is retried.

use std::future::Future;
use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::cancel::run_cancellable;
use crate::config::{RoverConfig, UploadPolicy};
use crate::error::{ErrorKind, RoverError};
use crate::storage::StorageClient;
use crate::sync::StateSynchronizer;
use crate::terraform::state::StatePaths;
use crate::terraform::{ExecutionError, TerraformOperations, backend, cleanup};

pub struct StateManager<S, T> {
    config: RoverConfig,
    paths: StatePaths,
    sync: StateSynchronizer<S>,
    terraform: T,
    cancel: CancellationToken,
}

impl<S, T> StateManager<S, T>
where
    S: StorageClient,
    T: TerraformOperations,
{
    pub fn new(config: RoverConfig, storage: S, terraform: T, cancel: CancellationToken) -> Self {
        let paths = config.state_paths();
        let sync = StateSynchronizer::new(
            storage,
            &config.coordinate,
            paths.clone(),
            cancel.clone(),
        );

        Self {
            config,
            paths,
            sync,
            terraform,
            cancel,
        }
    }

    pub fn config(&self) -> &RoverConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        self.sync.storage()
    }

    pub fn terraform(&self) -> &T {
        &self.terraform
    }

    fn wrap(&self, operation: &str, path: &Path, kind: ErrorKind) -> RoverError {
        RoverError::new(operation, path, self.config.tool_version.as_str(), kind)
    }

    fn state_error(&self, operation: &str, kind: ErrorKind) -> RoverError {
        self.wrap(operation, &self.paths.state(), kind)
    }

    /// Cleanup, then backend files, then `init`.
    pub async fn initialize(&self) -> Result<(), RoverError> {
        let wd = &self.config.working_dir;
        tracing::info!(
            level = %self.config.coordinate.level,
            workspace = %self.config.coordinate.workspace,
            version = %self.config.tool_version,
            "initializing"
        );

        cleanup::cleanup(
            wd,
            &self.config.data_dir,
            &self.config.coordinate.level,
            &self.config.coordinate.workspace,
        )
        .map_err(|e| self.wrap("cleanup", wd, e))?;

        let dir = self.paths.dir();
        std::fs::create_dir_all(dir)
            .map_err(|e| self.wrap("initialize", dir, ErrorKind::io(dir, e)))?;

        backend::generate(&self.config.backend, &self.config.tool_version, wd)
            .map_err(|e| self.wrap("generate backend", wd, e))?;

        run_cancellable(&self.cancel, self.terraform.init())
            .await
            .map_err(|e| self.wrap("init", wd, e))
    }

    /// Downloads state then plans. With `allow_missing_state` set, an absent
    /// remote state is treated as a fresh workspace.
    pub async fn plan(&self, destroy: bool) -> Result<(), RoverError> {
        match self.sync.download().await {
            Ok(_) => {}
            Err(ErrorKind::StateNotFound { container, key }) if self.config.allow_missing_state => {
                tracing::warn!(
                    %container,
                    %key,
                    "no remote state, planning against an empty state"
                );
            }
            Err(e) => return Err(self.state_error("download", e)),
        }

        run_cancellable(&self.cancel, self.terraform.plan(destroy))
            .await
            .map_err(|e| self.wrap("plan", &self.paths.plan(), e))
    }

    pub async fn apply(&self) -> Result<(), RoverError> {
        self.mutate("apply", self.terraform.apply()).await
    }

    pub async fn destroy(&self) -> Result<(), RoverError> {
        self.mutate("destroy", self.terraform.destroy()).await
    }

    /// Download, delegate, upload. Whether a failed delegate call is still
    /// followed by an upload is decided by the configured [`UploadPolicy`].
    async fn mutate<F>(&self, operation: &str, delegate: F) -> Result<(), RoverError>
    where
        F: Future<Output = Result<(), ExecutionError>>,
    {
        self.sync
            .download()
            .await
            .map_err(|e| self.state_error("download", e))?;

        let outcome = run_cancellable(&self.cancel, delegate).await;

        if let Err(e) = &outcome {
            // Never upload after cancellation.
            let skip_upload = matches!(e, ErrorKind::Cancelled)
                || self.config.upload_policy == UploadPolicy::OnSuccess;
            if skip_upload {
                return outcome.map_err(|e| self.state_error(operation, e));
            }
            tracing::warn!(operation, error = %e, "delegate failed, uploading state anyway");
        }

        self.sync
            .upload()
            .await
            .map_err(|e| self.state_error("upload", e))?;

        outcome.map_err(|e| self.state_error(operation, e))
    }

    pub async fn show(&self) -> Result<(), RoverError> {
        self.sync
            .download()
            .await
            .map_err(|e| self.state_error("download", e))?;

        run_cancellable(&self.cancel, self.terraform.show())
            .await
            .map_err(|e| self.state_error("show", e))
    }

    /// Local only: never touches storage.
    pub async fn validate(&self) -> Result<(), RoverError> {
        run_cancellable(&self.cancel, self.terraform.validate())
            .await
            .map_err(|e| self.wrap("validate", &self.config.working_dir, e))
    }

    /// Deletes the remote state (with snapshots) and the local mirrors.
    pub async fn purge(&self) -> Result<(), RoverError> {
        let deleted = self
            .sync
            .delete()
            .await
            .map_err(|e| self.state_error("delete", e))?;

        for path in [self.paths.state(), self.paths.plan()] {
            remove_if_present(&path).map_err(|e| self.wrap("purge", &path, e))?;
        }

        tracing::info!(remote = deleted, "state purged");
        Ok(())
    }
}

fn remove_if_present(path: &Path) -> Result<(), ErrorKind> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ErrorKind::io(path, e)),
    }
}
