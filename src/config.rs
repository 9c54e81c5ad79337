//! JSON configuration for a single transfer

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::operations::transfer::TransferOptions;
use crate::types::{SftpClientConfig, TransferRequest};

/// Default configuration file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Contents of the configuration file
///
/// ```json
/// {
///   "Server": "example.com:22",
///   "User": "deploy",
///   "SourcePath": "./reports",
///   "DstPath": "/data/"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppConfig {
    /// `host` or `host:port`
    pub server: String,
    pub user: String,
    /// Accepted for compatibility but never used: the connection is made
    /// through the system `ssh` client, which takes no password from a
    /// program. Authentication uses the ssh agent, default keys or `KeyPath`.
    #[serde(default)]
    pub password: Option<String>,
    pub source_path: PathBuf,
    /// Remote directory, ending with `/`
    pub dst_path: String,
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    #[serde(default)]
    pub control_dir: Option<PathBuf>,
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
    #[serde(default)]
    pub io_size: Option<usize>,
}

/// What the ssh connection needs to know
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub server: String,
    pub user: String,
    pub password: Option<String>,
    pub key_path: Option<PathBuf>,
    pub control_dir: PathBuf,
}

impl AppConfig {
    /// Reads and validates the configuration at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&content).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Parses and validates configuration text
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.trim().is_empty() {
            return Err(ConfigError::Invalid("Server must not be empty".into()));
        }
        if self.user.trim().is_empty() {
            return Err(ConfigError::Invalid("User must not be empty".into()));
        }
        if self.source_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("SourcePath must not be empty".into()));
        }
        // The remote path is built by plain concatenation
        if !self.dst_path.ends_with('/') {
            return Err(ConfigError::Invalid(format!(
                "DstPath {:?} must end with '/'",
                self.dst_path
            )));
        }
        if self.io_size == Some(0) {
            return Err(ConfigError::Invalid("IoSize must be greater than 0".into()));
        }
        Ok(())
    }

    pub fn transfer_request(&self) -> TransferRequest {
        TransferRequest::new(self.source_path.clone(), self.dst_path.clone())
    }

    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            server: self.server.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            key_path: self.key_path.clone(),
            control_dir: self.control_dir.clone().unwrap_or_else(std::env::temp_dir),
        }
    }

    pub fn sftp_client_config(&self) -> SftpClientConfig {
        SftpClientConfig::new(self.io_size.unwrap_or(SftpClientConfig::DEFAULT_IO_SIZE))
    }

    pub fn transfer_options(&self) -> TransferOptions {
        let defaults = TransferOptions::default();
        TransferOptions {
            staging_dir: self.staging_dir.clone().unwrap_or(defaults.staging_dir),
            io_size: self.io_size.unwrap_or(defaults.io_size),
        }
    }
}
