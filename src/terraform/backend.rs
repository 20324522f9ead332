//! Backend configuration files written into the working directory before
//! `init`.
//!
//! Tools that accept partial backend configuration get an empty backend
//! block plus a `backend.hcl` parameter file passed via `-backend-config`.
//! Older tools need every value inline in the declaration file.

use std::path::{Path, PathBuf};

use crate::config::{AzureRmBackend, BackendSpec, RemoteBackend, ToolVersion};
use crate::error::ErrorKind;

pub const AZURERM_DECLARATION_FILE: &str = "backend.azurerm.tf";
pub const REMOTE_DECLARATION_FILE: &str = "backend.hcl.tf";
pub const PARAMETER_FILE: &str = "backend.hcl";

pub fn declaration_file(spec: &BackendSpec) -> &'static str {
    match spec {
        BackendSpec::AzureRm(_) => AZURERM_DECLARATION_FILE,
        BackendSpec::Remote(_) => REMOTE_DECLARATION_FILE,
    }
}

fn azurerm_inline(b: &AzureRmBackend) -> String {
    format!(
        r#"terraform {{
    backend "azurerm" {{
        storage_account_name = "{}"
        resource_group_name = "{}"
        container_name = "{}"
        key = "{}"
        subscription_id = "{}"
    }}
}}
"#,
        b.storage_account, b.resource_group, b.container_name, b.key, b.subscription_id
    )
}

fn azurerm_parameters(b: &AzureRmBackend) -> String {
    format!(
        r#"storage_account_name = "{}"
resource_group_name = "{}"
container_name = "{}"
key = "{}"
subscription_id = "{}"
"#,
        b.storage_account, b.resource_group, b.container_name, b.key, b.subscription_id
    )
}

fn remote_inline(b: &RemoteBackend) -> String {
    format!(
        r#"terraform {{
    backend "remote" {{
        workspaces {{ name = "{}" }}
        hostname = "{}"
        organization = "{}"
    }}
}}
"#,
        b.workspace_name, b.hostname, b.organization
    )
}

fn remote_parameters(b: &RemoteBackend) -> String {
    format!(
        r#"workspaces {{ name = "{}" }}
hostname = "{}"
organization = "{}"
"#,
        b.workspace_name, b.hostname, b.organization
    )
}

fn empty_block(kind: &str) -> String {
    format!("terraform {{\n    backend \"{kind}\" {{}}\n}}\n")
}

fn write(path: PathBuf, contents: &str) -> Result<PathBuf, ErrorKind> {
    std::fs::write(&path, contents).map_err(|source| ErrorKind::ConfigWrite {
        path: path.clone(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "backend config written");
    Ok(path)
}

/// Writes the backend files for `spec` into `working_dir` and returns the
/// paths written, declaration first.
///
/// Not transactional: if the parameter file fails, the declaration file
/// stays on disk.
pub fn generate(
    spec: &BackendSpec,
    version: &ToolVersion,
    working_dir: &Path,
) -> Result<Vec<PathBuf>, ErrorKind> {
    let declaration = working_dir.join(declaration_file(spec));
    let kind = spec.kind().as_str();

    if !version.supports_partial_backend() {
        let contents = match spec {
            BackendSpec::AzureRm(b) => azurerm_inline(b),
            BackendSpec::Remote(b) => remote_inline(b),
        };
        tracing::info!(backend = kind, %version, "writing inline backend config");
        return Ok(vec![write(declaration, &contents)?]);
    }

    tracing::info!(backend = kind, %version, "writing partial backend config");
    let parameters = match spec {
        BackendSpec::AzureRm(b) => azurerm_parameters(b),
        BackendSpec::Remote(b) => remote_parameters(b),
    };

    let declaration = write(declaration, &empty_block(kind))?;
    let parameter_file = write(working_dir.join(PARAMETER_FILE), &parameters)?;
    Ok(vec![declaration, parameter_file])
}
