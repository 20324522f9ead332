use std::path::{Path, PathBuf};

/// Local mirror locations for a deployment's state and plan.
///
/// `{data_dir}/tfstates/{level}/{workspace}/{basename(working_dir)}.tfstate`
/// and the matching `.tfplan`. Pure function of its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    dir: PathBuf,
    state_name: String,
    plan_name: String,
}

impl StatePaths {
    pub fn new(data_dir: &Path, level: &str, workspace: &str, working_dir: &Path) -> Self {
        let base = working_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| working_dir.to_string_lossy().into_owned());

        Self {
            dir: data_dir.join("tfstates").join(level).join(workspace),
            state_name: format!("{base}.tfstate"),
            plan_name: format!("{base}.tfplan"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state_name(&self) -> &str {
        &self.state_name
    }

    pub fn plan_name(&self) -> &str {
        &self.plan_name
    }

    pub fn state(&self) -> PathBuf {
        self.dir.join(&self.state_name)
    }

    pub fn plan(&self) -> PathBuf {
        self.dir.join(&self.plan_name)
    }
}
