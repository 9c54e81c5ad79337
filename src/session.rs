use anyhow::anyhow;
use openssh_sftp_client::{Sftp, SftpOptions};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::client::SftpClient;
use crate::config::ConnectionConfig;
use crate::error::RemoteCommandError;
use crate::operations::remote::run_remote_command;
use crate::transport::RemoteShell;
use crate::types::SftpClientConfig;
use crate::utils::check_connection;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Manager for the ssh connection that creates SFTP clients and runs
/// remote commands
#[derive(Debug, Default)]
pub struct SftpSessionManager {
    pub session: Option<Arc<openssh::Session>>,
}

impl SftpSessionManager {
    /// Establishes a new ssh connection to the remote host
    ///
    /// Authentication is left to the system `ssh` client (agent, default
    /// keys, or `key_path` when set).
    ///
    /// # Example
    ///
    /// ```ignore
    /// let config = AppConfig::load("config.json")?;
    /// let manager = SftpSessionManager::connect(&config.connection()).await?;
    /// ```
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, anyhow::Error> {
        info!("Connecting to {:?}@{:?}", config.user, config.server);
        if config.password.is_some() {
            warn!("Password authentication is not supported; using ssh agent/key authentication");
        }

        let mut builder = openssh::SessionBuilder::default();
        builder
            .control_directory(&config.control_dir)
            .known_hosts_check(openssh::KnownHosts::Accept)
            .connect_timeout(CONNECT_TIMEOUT);
        if let Some(key_path) = &config.key_path {
            builder.keyfile(key_path);
        }
        let session = builder
            .connect(format!("ssh://{}@{}", config.user, config.server))
            .await
            .map_err(|e| anyhow!("ssh connection to {} failed: {e}", config.server))?;
        Ok(Self {
            session: Some(Arc::new(session)),
        })
    }

    fn session(&self) -> Result<&Arc<openssh::Session>, anyhow::Error> {
        self.session
            .as_ref()
            .ok_or(anyhow!("SSH session not connected"))
    }

    /// Creates a new SFTP client from the managed ssh session
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The ssh session is not connected
    /// - The session check fails (connection is dead)
    /// - SFTP subsystem cannot be initialized
    pub async fn create_sftp_client(
        &self,
        config: SftpClientConfig,
    ) -> Result<SftpClient, anyhow::Error> {
        debug!("Creating sftp client from session");
        let session = self.session()?;
        session
            .check()
            .await
            .map_err(|_| anyhow!("sftp session is already closed"))?;

        let sftp = Sftp::from_clonable_session_with_check_connection(
            session.clone(),
            SftpOptions::default(),
            check_connection,
        )
        .await?;
        debug!("sftp client created successfully");
        Ok(SftpClient::new(sftp, config))
    }

    /// Closes the ssh session if no SFTP clients are using it
    ///
    /// Uses `Arc::try_unwrap`, so every [`SftpClient`] created from this
    /// manager has to be closed or dropped first.
    pub async fn close(&mut self) -> Result<(), anyhow::Error> {
        if let Some(session) = self.session.take() {
            match Arc::try_unwrap(session) {
                Ok(session) => {
                    info!("No sftp client is using the session anymore so can close the session");
                    session.close().await?;
                    Ok(())
                }
                Err(session) => {
                    error!(
                        "Some sftp client still has the session instance so could not close session"
                    );
                    self.session = Some(session);
                    Err(anyhow!("failed to close ssh session"))
                }
            }
        } else {
            error!("Session not found");
            Err(anyhow!("failed to close ssh session"))
        }
    }

    /// Checks if the ssh session is still active, forgetting it if not
    pub async fn connected(&mut self) -> bool {
        match self.session.as_ref() {
            Some(session) => {
                if session.check().await.is_ok() {
                    true
                } else {
                    warn!("Underlying ssh session is dead so setting status to disconnected");
                    self.session = None;
                    false
                }
            }
            None => false,
        }
    }
}

impl RemoteShell for SftpSessionManager {
    async fn run(&self, command_line: &str) -> Result<(), RemoteCommandError> {
        let session = self.session.as_ref().ok_or_else(|| RemoteCommandError::Session {
            command: command_line.to_string(),
            source: openssh::Error::Disconnected,
        })?;
        run_remote_command(session, command_line).await
    }
}
