#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rover::resolver::{ENVIRONMENT_TAG, TFSTATE_TAG};
use rover::storage::{StorageAccount, Tags};
use rover::{
    ExecutionError, InMemoryStorage, RoverConfig, RoverSettings, TerraformOperations, UploadPolicy,
};
use tempfile::TempDir;

pub const ACCOUNT: &str = "stlevel0sandpit";
pub const CONTAINER: &str = "tfstate";
pub const KEY: &str = "caf_launchpad.tfstate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Fail,
    /// Never completes on its own.
    Hang,
}

#[derive(Debug, Default)]
struct Inner {
    calls: Mutex<Vec<String>>,
    behavior: Mutex<HashMap<&'static str, Behavior>>,
    writes_state: Mutex<Option<(PathBuf, Vec<u8>)>>,
    removes_state: Mutex<Option<PathBuf>>,
}

/// Tool double that records each call and can be told to fail or hang.
#[derive(Debug, Clone, Default)]
pub struct RecordingTerraform {
    inner: Arc<Inner>,
}

impl RecordingTerraform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, operation: &'static str, behavior: Behavior) -> Self {
        self.inner
            .behavior
            .lock()
            .unwrap()
            .insert(operation, behavior);
        self
    }

    /// `apply` and `destroy` write `contents` to `path` before returning.
    pub fn writing_state(self, path: PathBuf, contents: impl Into<Vec<u8>>) -> Self {
        *self.inner.writes_state.lock().unwrap() = Some((path, contents.into()));
        self
    }

    /// `apply` and `destroy` delete `path` before returning.
    pub fn removing_state(self, path: PathBuf) -> Self {
        *self.inner.removes_state.lock().unwrap() = Some(path);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.calls.lock().unwrap().clone()
    }

    async fn record(&self, call: String, operation: &'static str) -> Result<(), ExecutionError> {
        self.inner.calls.lock().unwrap().push(call);

        if matches!(operation, "apply" | "destroy") {
            let write = self.inner.writes_state.lock().unwrap().clone();
            if let Some((path, contents)) = write {
                std::fs::write(path, contents)?;
            }
            let remove = self.inner.removes_state.lock().unwrap().clone();
            if let Some(path) = remove {
                std::fs::remove_file(path)?;
            }
        }

        let behavior = self
            .inner
            .behavior
            .lock()
            .unwrap()
            .get(operation)
            .copied()
            .unwrap_or(Behavior::Succeed);

        match behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(ExecutionError::Failed {
                command: operation.to_string(),
                code: Some(1),
            }),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl TerraformOperations for RecordingTerraform {
    async fn init(&self) -> Result<(), ExecutionError> {
        self.record("init".to_string(), "init").await
    }

    async fn plan(&self, destroy: bool) -> Result<(), ExecutionError> {
        self.record(format!("plan(destroy={destroy})"), "plan").await
    }

    async fn apply(&self) -> Result<(), ExecutionError> {
        self.record("apply".to_string(), "apply").await
    }

    async fn destroy(&self) -> Result<(), ExecutionError> {
        self.record("destroy".to_string(), "destroy").await
    }

    async fn show(&self) -> Result<(), ExecutionError> {
        self.record("show".to_string(), "show").await
    }

    async fn validate(&self) -> Result<(), ExecutionError> {
        self.record("validate".to_string(), "validate").await
    }
}

/// A landing zone directory and data directory under one temp root.
pub struct Workspace {
    pub root: TempDir,
    pub working_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let working_dir = root.path().join("landingzones").join("caf_launchpad");
        let data_dir = root.path().join("data");
        std::fs::create_dir_all(&working_dir).unwrap();

        Self {
            root,
            working_dir,
            data_dir,
        }
    }

    pub fn settings(&self) -> RoverSettings {
        RoverSettings {
            working_dir: self.working_dir.clone(),
            data_dir: Some(self.data_dir.clone()),
            level: "level0".to_string(),
            workspace: CONTAINER.to_string(),
            environment: "sandpit".to_string(),
            subscription_id: "11111111-2222-3333-4444-555555555555".to_string(),
            storage_account_name: ACCOUNT.to_string(),
            resource_group_name: "rg-launchpad".to_string(),
            tool_version: Some("1.2.3".to_string()),
            upload_policy: UploadPolicy::OnSuccess,
            ..Default::default()
        }
    }

    pub fn config(&self) -> RoverConfig {
        RoverConfig::from_settings(self.settings()).unwrap()
    }

    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("tfstates").join("level0").join(CONTAINER)
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_dir().join(KEY)
    }

    pub fn plan_file(&self) -> PathBuf {
        self.state_dir().join("caf_launchpad.tfplan")
    }
}

/// Storage with one account tagged for `level0`/`sandpit`, preceded by a
/// page of unrelated accounts.
pub fn storage() -> InMemoryStorage {
    InMemoryStorage::new(vec![
        vec![tagged_account("stlevel1sandpit", "level1", "sandpit")],
        vec![tagged_account(ACCOUNT, "level0", "sandpit")],
    ])
}

pub fn tagged_account(name: &str, level: &str, environment: &str) -> StorageAccount {
    let tags: Tags = [
        (TFSTATE_TAG.to_string(), Some(level.to_string())),
        (ENVIRONMENT_TAG.to_string(), Some(environment.to_string())),
    ]
    .into_iter()
    .collect();

    StorageAccount {
        name: name.to_string(),
        id: Some(format!(
            "/subscriptions/11111111-2222-3333-4444-555555555555/resourceGroups/rg-launchpad/providers/Microsoft.Storage/storageAccounts/{name}"
        )),
        tags: Some(tags),
    }
}

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}
