//! Error types for archival, remote commands and the transfer run

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while zipping a local directory
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("source directory {path:?} is not readable: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("archive {path:?} cannot be written: {source}")]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read entry {path:?}: {source}")]
    EntryReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors raised by a single command executed on the remote host
#[derive(Debug, Error)]
pub enum RemoteCommandError {
    #[error("failed to run `{command}` on remote host: {source}")]
    Session {
        command: String,
        #[source]
        source: openssh::Error,
    },

    #[error("remote command `{command}` exited with {}: {stderr}", display_code(.code))]
    ExitStatus {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl RemoteCommandError {
    /// The command line that failed
    pub fn command(&self) -> &str {
        match self {
            Self::Session { command, .. } | Self::ExitStatus { command, .. } => command,
        }
    }
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "no exit code (killed by signal)".to_string(),
    }
}

/// Errors that abort a transfer run. The first one raised ends the run.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("source {path:?} not found: {source}")]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("source {0:?} has no file name")]
    InvalidSource(PathBuf),

    #[error("staged archive {0:?} already exists; refusing to overwrite it")]
    StagingOccupied(PathBuf),

    #[error("archival failed: {0}")]
    ArchivalFailed(#[from] ArchiveError),

    #[error("upload of {local:?} to {remote} failed: {source}")]
    UploadFailed {
        local: PathBuf,
        remote: String,
        #[source]
        source: io::Error,
    },

    #[error("remote expansion failed: {0}")]
    RemoteExpandFailed(#[source] RemoteCommandError),

    #[error("remote archive cleanup failed: {0}")]
    RemoteCleanupFailed(#[source] RemoteCommandError),
}
