mod cli;

use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::Result;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use rover::storage::azure::AzureClientOptions;
use rover::{AzureStorageClient, RoverConfig, StateManager, TerraformCli};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let args = cli.global;

    let config = RoverConfig::from_settings(args.settings())?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    let storage = AzureStorageClient::with_options(
        config.subscription_id.clone(),
        args.access_token.unwrap_or_default(),
        AzureClientOptions {
            arm_endpoint: args.arm_endpoint,
            blob_endpoint: args.blob_endpoint,
            timeout: Some(Duration::from_secs(args.timeout_secs)),
        },
    )?;
    let terraform = TerraformCli::new(args.terraform_bin, &config).with_no_color(args.no_color);

    let manager = StateManager::new(config, storage, terraform, cancel);

    match cli.command {
        Command::Init => manager.initialize().await?,
        Command::Plan { destroy } => manager.plan(destroy).await?,
        Command::Apply => manager.apply().await?,
        Command::Destroy => manager.destroy().await?,
        Command::Show => manager.show().await?,
        Command::Validate => manager.validate().await?,
        Command::Purge => manager.purge().await?,
    }

    tracing::info!("done");
    Ok(())
}
