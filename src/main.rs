use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use tracing::{Level, error, info, warn};
use zipdrop::config::{AppConfig, DEFAULT_CONFIG_FILE};
use zipdrop::{SftpSessionManager, TransferOrchestrator, TransferSummary};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    match run().await {
        Ok(summary) => {
            info!(
                "Transferred {:?} to {} ({} bytes)",
                summary.source, summary.remote_path, summary.bytes_uploaded
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<TransferSummary, anyhow::Error> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = AppConfig::load(&config_path)?;

    let mut manager = SftpSessionManager::connect(&config.connection()).await?;
    let result = transfer(&mut manager, &config).await;
    if let Err(err) = manager.close().await {
        warn!("Closing ssh session failed: {:#}", err);
    }
    result
}

async fn transfer(
    manager: &mut SftpSessionManager,
    config: &AppConfig,
) -> Result<TransferSummary, anyhow::Error> {
    if !manager.connected().await {
        anyhow::bail!("ssh session to {} is not connected", config.server);
    }
    let client = manager
        .create_sftp_client(config.sftp_client_config())
        .await
        .context("failed to open sftp subsystem")?;
    let orchestrator = TransferOrchestrator::new(config.transfer_options());
    let result = orchestrator
        .run(&config.transfer_request(), &*manager, &client)
        .await;
    if let Err(err) = client.close().await {
        warn!("Closing sftp client failed: {:#}", err);
    }
    Ok(result?)
}
