use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use rover::config::{BackendKind, DEFAULT_DATA_DIR, DEFAULT_TF_CLOUD_HOSTNAME, DEFAULT_TOOL_VERSION};
use rover::storage::azure::ARM_ENDPOINT;
use rover::{RoverSettings, UploadPolicy};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Clean stale files, write backend config and run `init`
    Init,
    /// Download state and run `plan`
    Plan {
        #[arg(long)]
        destroy: bool,
    },
    /// Download state, run `apply`, upload state
    Apply,
    /// Download state, run `destroy`, upload state
    Destroy,
    /// Download state and run `show`
    Show,
    /// Run `validate` without touching remote state
    Validate,
    /// Delete the remote state blob and local mirrors
    Purge,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Azurerm,
    Remote,
}

impl From<BackendType> for BackendKind {
    fn from(value: BackendType) -> Self {
        match value {
            BackendType::Azurerm => BackendKind::AzureRm,
            BackendType::Remote => BackendKind::Remote,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPolicyArg {
    OnSuccess,
    Always,
}

impl From<UploadPolicyArg> for UploadPolicy {
    fn from(value: UploadPolicyArg) -> Self {
        match value {
            UploadPolicyArg::OnSuccess => UploadPolicy::OnSuccess,
            UploadPolicyArg::Always => UploadPolicy::Always,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct GlobalArgs {
    /// Landing zone directory; its last component names the state blob
    #[arg(long, env = "TF_VAR_tf_name")]
    pub tf_name: PathBuf,

    #[arg(long, env = "TF_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    #[arg(long, env = "TF_VAR_level")]
    pub level: String,

    #[arg(long, env = "TF_VAR_workspace")]
    pub workspace: String,

    #[arg(long, env = "TF_VAR_environment", default_value = "")]
    pub environment: String,

    #[arg(long, env = "TF_VAR_tfstate_subscription_id")]
    pub subscription_id: String,

    #[arg(long, env = "TF_VAR_tfstate_storage_account_name", default_value = "")]
    pub storage_account_name: String,

    #[arg(long, env = "TF_VAR_tfstate_resource_group_name", default_value = "")]
    pub resource_group_name: String,

    #[arg(long, env = "TF_VAR_backend_type", value_enum, default_value_t = BackendType::Azurerm)]
    pub backend_type: BackendType,

    #[arg(long, env = "TF_VAR_tf_cloud_organization", default_value = "")]
    pub tf_cloud_organization: String,

    #[arg(long, env = "TF_VAR_tf_cloud_hostname", default_value = DEFAULT_TF_CLOUD_HOSTNAME)]
    pub tf_cloud_hostname: String,

    #[arg(long, env = "TF_VERSION", default_value = DEFAULT_TOOL_VERSION)]
    pub tf_version: String,

    #[arg(long, env = "TERRAFORM_BIN", default_value = "terraform")]
    pub terraform_bin: String,

    #[arg(long, env = "TF_NO_COLOR")]
    pub no_color: bool,

    #[arg(
        long,
        env = "ROVER_UPLOAD_POLICY",
        value_enum,
        default_value_t = UploadPolicyArg::OnSuccess
    )]
    pub upload_policy: UploadPolicyArg,

    /// Let `plan` run against an empty state when no remote state exists
    #[arg(long, env = "ROVER_ALLOW_MISSING_STATE")]
    pub allow_missing_state: bool,

    #[arg(long, env = "AZURE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    #[arg(long, env = "ARM_ENDPOINT", default_value = ARM_ENDPOINT)]
    pub arm_endpoint: String,

    /// Path-style blob endpoint override, e.g. an Azurite emulator
    #[arg(long, env = "AZURE_STORAGE_BLOB_ENDPOINT")]
    pub blob_endpoint: Option<String>,

    #[arg(long, env = "ROVER_TIMEOUT_SECS", default_value_t = 60)]
    pub timeout_secs: u64,
}

impl GlobalArgs {
    pub fn settings(&self) -> RoverSettings {
        RoverSettings {
            working_dir: self.tf_name.clone(),
            data_dir: Some(self.data_dir.clone()),
            level: self.level.clone(),
            workspace: self.workspace.clone(),
            environment: self.environment.clone(),
            subscription_id: self.subscription_id.clone(),
            backend_kind: self.backend_type.into(),
            storage_account_name: self.storage_account_name.clone(),
            resource_group_name: self.resource_group_name.clone(),
            tf_cloud_organization: self.tf_cloud_organization.clone(),
            tf_cloud_hostname: Some(self.tf_cloud_hostname.clone()),
            tool_version: Some(self.tf_version.clone()),
            upload_policy: self.upload_policy.into(),
            allow_missing_state: self.allow_missing_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serial_test::serial;

    const REQUIRED: [&str; 5] = [
        "--tf-name=/tf/caf/landingzones/caf_launchpad",
        "--level=level0",
        "--workspace=tfstate",
        "--subscription-id=sub-1",
        "--environment=sandpit",
    ];

    fn parse(extra: &[&str]) -> Cli {
        let mut argv = vec!["rover"];
        argv.extend(REQUIRED);
        argv.extend(extra);
        Cli::parse_from(argv)
    }

    /// Runs `f` with `vars` set, restoring the previous values afterwards.
    fn with_env<R>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> R) -> R {
        let backup: Vec<(String, Option<String>)> = vars
            .iter()
            .map(|(k, _)| (k.to_string(), std::env::var(k).ok()))
            .collect();

        unsafe {
            for (k, v) in vars {
                match v {
                    Some(v) => std::env::set_var(k, v),
                    None => std::env::remove_var(k),
                }
            }
        }

        let result = f();

        unsafe {
            for (k, v) in backup {
                match v {
                    Some(v) => std::env::set_var(&k, v),
                    None => std::env::remove_var(&k),
                }
            }
        }
        result
    }

    #[test]
    #[serial]
    fn test_subcommands_parse() {
        assert_eq!(parse(&["init"]).command, Command::Init);
        assert_eq!(parse(&["plan"]).command, Command::Plan { destroy: false });
        assert_eq!(parse(&["plan", "--destroy"]).command, Command::Plan { destroy: true });
        assert_eq!(parse(&["apply"]).command, Command::Apply);
        assert_eq!(parse(&["destroy"]).command, Command::Destroy);
        assert_eq!(parse(&["show"]).command, Command::Show);
        assert_eq!(parse(&["validate"]).command, Command::Validate);
        assert_eq!(parse(&["purge"]).command, Command::Purge);
    }

    #[test]
    #[serial]
    fn test_defaults_when_env_is_clear() {
        let cli = with_env(
            &[
                ("TF_DATA_DIR", None),
                ("TF_VERSION", None),
                ("TF_VAR_backend_type", None),
                ("ROVER_UPLOAD_POLICY", None),
                ("ARM_ENDPOINT", None),
            ],
            || parse(&["validate"]),
        );

        assert_eq!(cli.global.data_dir, PathBuf::from("/tf/caf"));
        assert_eq!(cli.global.tf_version, "1.0.0");
        assert_eq!(cli.global.backend_type, BackendType::Azurerm);
        assert_eq!(cli.global.upload_policy, UploadPolicyArg::OnSuccess);
        assert_eq!(cli.global.arm_endpoint, "https://management.azure.com");
        assert_eq!(cli.global.timeout_secs, 60);
    }

    #[test]
    #[serial]
    fn test_required_values_from_env() {
        let cli = with_env(
            &[
                ("TF_VAR_tf_name", Some("/tf/caf/landingzones/networking")),
                ("TF_VAR_level", Some("level2")),
                ("TF_VAR_workspace", Some("prod")),
                ("TF_VAR_tfstate_subscription_id", Some("sub-env")),
            ],
            || Cli::parse_from(["rover", "show"]),
        );

        assert_eq!(cli.global.tf_name, PathBuf::from("/tf/caf/landingzones/networking"));
        assert_eq!(cli.global.level, "level2");
        assert_eq!(cli.global.workspace, "prod");
        assert_eq!(cli.global.subscription_id, "sub-env");
    }

    #[test]
    #[serial]
    fn test_flag_takes_precedence_over_env() {
        let cli = with_env(&[("TF_VERSION", Some("0.14.11"))], || {
            parse(&["--tf-version=1.5.7", "init"])
        });
        assert_eq!(cli.global.tf_version, "1.5.7");
    }

    #[test]
    #[serial]
    fn test_backend_and_policy_from_env() {
        let cli = with_env(
            &[
                ("TF_VAR_backend_type", Some("remote")),
                ("ROVER_UPLOAD_POLICY", Some("always")),
            ],
            || parse(&["apply"]),
        );

        assert_eq!(cli.global.backend_type, BackendType::Remote);
        assert_eq!(cli.global.upload_policy, UploadPolicyArg::Always);
    }

    #[test]
    #[serial]
    fn test_settings_conversion() {
        let cli = with_env(
            &[
                ("TF_VAR_backend_type", None),
                ("ROVER_ALLOW_MISSING_STATE", None),
            ],
            || parse(&["--storage-account-name=stlevel0", "--allow-missing-state", "plan"]),
        );
        let settings = cli.global.settings();

        assert_eq!(settings.level, "level0");
        assert_eq!(settings.storage_account_name, "stlevel0");
        assert_eq!(settings.backend_kind, BackendKind::AzureRm);
        assert!(settings.allow_missing_state);
        assert_eq!(settings.upload_policy, UploadPolicy::OnSuccess);
    }
}
