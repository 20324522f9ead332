use std::io;
use std::path::Path;

use glob::Pattern;

use crate::error::ErrorKind;

/// Glob patterns of every generated or mirrored artifact for a deployment.
fn patterns(working_dir: &Path, data_dir: &Path, level: &str, workspace: &str) -> Vec<String> {
    let wd = Pattern::escape(&working_dir.to_string_lossy());
    let data = Pattern::escape(&data_dir.to_string_lossy());
    let states = Pattern::escape(
        &data_dir
            .join("tfstates")
            .join(level)
            .join(workspace)
            .to_string_lossy(),
    );

    vec![
        format!("{wd}/backend.*.tf"),
        format!("{wd}/backend.hcl"),
        format!("{wd}/caf.auto.tfvars"),
        format!("{data}/terraform.tfstate"),
        format!("{states}/*.tfstate"),
        format!("{states}/*.tfplan"),
    ]
}

/// Removes stale backend files and local state/plan mirrors.
///
/// Best effort: every pattern is attempted, failures are collected and
/// reported together. Already-missing files are not failures.
pub fn cleanup(
    working_dir: &Path,
    data_dir: &Path,
    level: &str,
    workspace: &str,
) -> Result<usize, ErrorKind> {
    let mut errors = Vec::new();
    let mut removed = 0usize;

    for pattern in patterns(working_dir, data_dir, level, workspace) {
        let entries = match glob::glob(&pattern) {
            Ok(entries) => entries,
            Err(e) => {
                errors.push(format!("failed to glob pattern {pattern}: {e}"));
                continue;
            }
        };

        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    errors.push(format!("failed to read {}: {}", e.path().display(), e.error()));
                    continue;
                }
            };

            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "removed");
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => errors.push(format!("failed to remove {}: {}", path.display(), e)),
            }
        }
    }

    if !errors.is_empty() {
        return Err(ErrorKind::Cleanup { errors });
    }

    tracing::info!(removed, "workspace cleaned");
    Ok(removed)
}
