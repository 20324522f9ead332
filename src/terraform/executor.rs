//! Runs the `terraform` binary as a subprocess.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::backend::PARAMETER_FILE;
use super::state::StatePaths;
use super::{ExecutionError, TerraformOperations};
use crate::config::{RoverConfig, ToolVersion};

/// `-chdir` appeared in 0.14.
const MIN_CHDIR_VERSION: (u64, u64) = (0, 14);

#[derive(Debug, Clone)]
pub struct TerraformCli {
    binary: String,
    working_dir: PathBuf,
    paths: StatePaths,
    version: ToolVersion,
    no_color: bool,
    env: Vec<(String, String)>,
}

impl TerraformCli {
    pub fn new(binary: impl Into<String>, config: &RoverConfig) -> Self {
        Self {
            binary: binary.into(),
            working_dir: config.working_dir.clone(),
            paths: config.state_paths(),
            version: config.tool_version.clone(),
            no_color: false,
            env: config.tool_env(),
        }
    }

    pub fn with_no_color(mut self, no_color: bool) -> Self {
        self.no_color = no_color;
        self
    }

    fn check_version(&self) -> Result<(), ExecutionError> {
        match self.version.major_minor() {
            Some(found) if found < MIN_CHDIR_VERSION => Err(ExecutionError::VersionUnsupported {
                current: self.version.to_string(),
                required: format!("{}.{}", MIN_CHDIR_VERSION.0, MIN_CHDIR_VERSION.1),
                feature: "-chdir working directory selection".to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub fn init_args(&self) -> Vec<String> {
        let mut args = vec!["init".to_string(), "-reconfigure".to_string(), "-upgrade".to_string()];
        if self.version.supports_partial_backend() {
            args.push(format!("-backend-config={PARAMETER_FILE}"));
        }
        args.push("-input=false".to_string());
        args
    }

    pub fn plan_args(&self, destroy: bool) -> Vec<String> {
        let mut args = vec!["plan".to_string()];
        if destroy {
            args.push("-destroy".to_string());
        }
        args.push(format!("-state={}", self.paths.state().display()));
        args.push(format!("-out={}", self.paths.plan().display()));
        args.push("-input=false".to_string());
        args
    }

    pub fn apply_args(&self) -> Vec<String> {
        vec![
            "apply".to_string(),
            format!("-state={}", self.paths.state().display()),
            "-input=false".to_string(),
            self.paths.plan().display().to_string(),
        ]
    }

    pub fn show_args(&self) -> Vec<String> {
        vec!["show".to_string(), self.paths.state().display().to_string()]
    }

    pub fn validate_args(&self) -> Vec<String> {
        vec!["validate".to_string()]
    }

    async fn run(&self, args: Vec<String>) -> Result<(), ExecutionError> {
        self.check_version()?;

        let command = args.first().cloned().unwrap_or_default();
        let mut cmd = Command::new(&self.binary);
        cmd.arg(format!("-chdir={}", self.working_dir.display()))
            .args(&args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if self.no_color {
            cmd.arg("-no-color");
        }

        tracing::info!(binary = %self.binary, ?args, "running terraform");

        let status = cmd.status().await.map_err(|source| ExecutionError::Spawn {
            binary: self.binary.clone(),
            source,
        })?;

        if !status.success() {
            return Err(ExecutionError::Failed {
                command,
                code: status.code(),
            });
        }
        Ok(())
    }
}

fn ensure_dir(path: &Path) -> Result<(), ExecutionError> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

#[async_trait]
impl TerraformOperations for TerraformCli {
    async fn init(&self) -> Result<(), ExecutionError> {
        ensure_dir(self.paths.dir())?;
        self.run(self.init_args()).await
    }

    async fn plan(&self, destroy: bool) -> Result<(), ExecutionError> {
        ensure_dir(self.paths.dir())?;
        self.run(self.plan_args(destroy)).await
    }

    async fn apply(&self) -> Result<(), ExecutionError> {
        let plan = self.paths.plan();
        if !plan.exists() {
            return Err(ExecutionError::PlanNotFound(plan));
        }
        self.run(self.apply_args()).await
    }

    async fn destroy(&self) -> Result<(), ExecutionError> {
        self.plan(true).await?;
        self.apply().await
    }

    async fn show(&self) -> Result<(), ExecutionError> {
        let state = self.paths.state();
        if !state.exists() {
            return Err(ExecutionError::StateNotFound(state));
        }
        self.run(self.show_args()).await
    }

    async fn validate(&self) -> Result<(), ExecutionError> {
        self.run(self.validate_args()).await
    }
}
