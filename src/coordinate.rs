use std::path::Path;

use crate::config::ConfigError;

/// Identifies which remote state belongs where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentCoordinate {
    pub level: String,
    pub workspace: String,
    pub environment: String,
}

impl DeploymentCoordinate {
    pub fn new(
        level: impl Into<String>,
        workspace: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            level: level.into(),
            workspace: workspace.into(),
            environment: environment.into(),
        }
    }
}

/// Final path component of the working directory. Every state and plan file
/// name is derived from it.
pub fn deployment_name(working_dir: &Path) -> Result<String, ConfigError> {
    working_dir
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::InvalidWorkingDir(working_dir.to_path_buf()))
}
