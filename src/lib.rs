//! Send a local file or directory to a remote host over ssh.
//!
//! Plain files are streamed over SFTP. Directories are zipped locally,
//! uploaded as `<name>.zip`, expanded with `unzip` on the remote host and
//! the remote archive is then removed.

// Module declarations
mod client;
pub mod config;
mod error;
mod operations;
mod session;
mod transport;
mod types;
mod utils;

// Public API exports
pub use client::{SftpClient, SftpRemoteFile};
pub use error::{ArchiveError, RemoteCommandError, TransferError};
pub use operations::archive::{ArchiveSummary, archive};
pub use operations::remote::{cleanup_command, expand_command, run_remote_command};
pub use operations::transfer::{TransferOptions, TransferOrchestrator, describe_source};
pub use operations::upload::upload;
pub use session::SftpSessionManager;
pub use transport::{RemoteFile, RemoteShell, TransferEndpoint};
pub use types::{
    FileTransferProgress, RemoteTarget, SftpClientConfig, SourceDescriptor, TransferKind,
    TransferRequest, TransferSummary, archive_file_name,
};
