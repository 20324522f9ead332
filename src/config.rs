//! Immutable per-invocation configuration.
//!
//! Everything here is built once from parsed CLI arguments. Nothing in the
//! library reads the process environment after construction.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::coordinate::{DeploymentCoordinate, deployment_name};
use crate::terraform::state::StatePaths;

pub const DEFAULT_DATA_DIR: &str = "/tf/caf";
pub const DEFAULT_TOOL_VERSION: &str = "1.0.0";
pub const DEFAULT_TF_CLOUD_HOSTNAME: &str = "app.terraform.io";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("working directory has no final path component: {}", .0.display())]
    InvalidWorkingDir(PathBuf),

    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

/// Version string of the infrastructure tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolVersion(String);

impl ToolVersion {
    pub fn new(version: impl Into<String>) -> Self {
        let version = version.into();
        if version.trim().is_empty() {
            return Self::default();
        }
        Self(version)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the tool accepts a partial backend block with parameters
    /// supplied from `backend.hcl`.
    ///
    /// NOTE: prefix test only. "1.x" and "15..." both qualify, "0.15.0" does not.
    pub fn supports_partial_backend(&self) -> bool {
        self.0.starts_with("15") || self.0.starts_with("1.")
    }

    /// Leading `major.minor` pair, if the string parses as one.
    pub fn major_minor(&self) -> Option<(u64, u64)> {
        let trimmed = self.0.trim_start_matches('v');
        let mut parts = trimmed.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts
            .next()
            .map(|m| {
                m.chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect::<String>()
            })
            .and_then(|m| m.parse().ok())
            .unwrap_or(0);
        Some((major, minor))
    }
}

impl Default for ToolVersion {
    fn default() -> Self {
        Self(DEFAULT_TOOL_VERSION.to_string())
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    AzureRm,
    Remote,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::AzureRm => "azurerm",
            BackendKind::Remote => "remote",
        }
    }
}

/// Storage-account backed state (`backend "azurerm"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureRmBackend {
    pub storage_account: String,
    pub resource_group: String,
    pub container_name: String,
    pub key: String,
    pub subscription_id: String,
}

/// Hosted remote-execution service (`backend "remote"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBackend {
    pub organization: String,
    pub hostname: String,
    pub workspace_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSpec {
    AzureRm(AzureRmBackend),
    Remote(RemoteBackend),
}

impl BackendSpec {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendSpec::AzureRm(_) => BackendKind::AzureRm,
            BackendSpec::Remote(_) => BackendKind::Remote,
        }
    }
}

/// When `apply`/`destroy` push local state back after the delegated call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadPolicy {
    /// Upload only when the delegated call returned success.
    #[default]
    OnSuccess,
    /// Upload whenever the delegated call returned, success or not.
    Always,
}

/// Raw settings as collected by the CLI layer.
#[derive(Debug, Clone, Default)]
pub struct RoverSettings {
    pub working_dir: PathBuf,
    pub data_dir: Option<PathBuf>,
    pub level: String,
    pub workspace: String,
    pub environment: String,
    pub subscription_id: String,
    pub backend_kind: BackendKind,
    pub storage_account_name: String,
    pub resource_group_name: String,
    pub tf_cloud_organization: String,
    pub tf_cloud_hostname: Option<String>,
    pub tool_version: Option<String>,
    pub upload_policy: UploadPolicy,
    pub allow_missing_state: bool,
}

#[derive(Debug, Clone)]
pub struct RoverConfig {
    pub working_dir: PathBuf,
    pub data_dir: PathBuf,
    pub coordinate: DeploymentCoordinate,
    pub subscription_id: String,
    pub backend: BackendSpec,
    pub tool_version: ToolVersion,
    pub upload_policy: UploadPolicy,
    pub allow_missing_state: bool,
}

impl RoverConfig {
    pub fn from_settings(settings: RoverSettings) -> Result<Self, ConfigError> {
        if settings.level.is_empty() {
            return Err(ConfigError::Missing("level"));
        }
        if settings.workspace.is_empty() {
            return Err(ConfigError::Missing("workspace"));
        }
        if settings.subscription_id.is_empty() {
            return Err(ConfigError::Missing("subscription_id"));
        }

        let name = deployment_name(&settings.working_dir)?;

        let backend = match settings.backend_kind {
            BackendKind::AzureRm => BackendSpec::AzureRm(AzureRmBackend {
                storage_account: settings.storage_account_name,
                resource_group: settings.resource_group_name,
                container_name: settings.workspace.clone(),
                key: format!("{name}.tfstate"),
                subscription_id: settings.subscription_id.clone(),
            }),
            BackendKind::Remote => BackendSpec::Remote(RemoteBackend {
                organization: settings.tf_cloud_organization,
                hostname: settings
                    .tf_cloud_hostname
                    .unwrap_or_else(|| DEFAULT_TF_CLOUD_HOSTNAME.to_string()),
                workspace_name: settings.workspace.clone(),
            }),
        };

        Ok(Self {
            working_dir: settings.working_dir,
            data_dir: settings
                .data_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            coordinate: DeploymentCoordinate::new(
                settings.level,
                settings.workspace,
                settings.environment,
            ),
            subscription_id: settings.subscription_id,
            backend,
            tool_version: settings
                .tool_version
                .map(ToolVersion::new)
                .unwrap_or_default(),
            upload_policy: settings.upload_policy,
            allow_missing_state: settings.allow_missing_state,
        })
    }

    pub fn state_paths(&self) -> StatePaths {
        StatePaths::new(
            &self.data_dir,
            &self.coordinate.level,
            &self.coordinate.workspace,
            &self.working_dir,
        )
    }

    /// Variables exported to the tool subprocess. Empty values are skipped.
    pub fn tool_env(&self) -> Vec<(String, String)> {
        let paths = self.state_paths();
        let mut env = vec![
            ("TF_DATA_DIR".to_string(), self.data_dir.display().to_string()),
            ("TF_VAR_level".to_string(), self.coordinate.level.clone()),
            ("TF_VAR_workspace".to_string(), self.coordinate.workspace.clone()),
            ("TF_VAR_environment".to_string(), self.coordinate.environment.clone()),
            ("TF_VAR_tf_name".to_string(), self.working_dir.display().to_string()),
            ("TF_VAR_tf_plan".to_string(), paths.plan_name().to_string()),
            ("TF_VAR_tfstate_subscription_id".to_string(), self.subscription_id.clone()),
        ];

        match &self.backend {
            BackendSpec::AzureRm(b) => {
                env.push((
                    "TF_VAR_tfstate_storage_account_name".to_string(),
                    b.storage_account.clone(),
                ));
                env.push((
                    "TF_VAR_tfstate_resource_group_name".to_string(),
                    b.resource_group.clone(),
                ));
            }
            BackendSpec::Remote(b) => {
                env.push((
                    "TF_VAR_tf_cloud_organization".to_string(),
                    b.organization.clone(),
                ));
                env.push(("TF_VAR_tf_cloud_hostname".to_string(), b.hostname.clone()));
            }
        }

        env.retain(|(_, value)| !value.is_empty());
        env
    }
}
