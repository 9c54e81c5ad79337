//! Seams between the transfer logic and the ssh connection
//!
//! The orchestrator only needs to create a remote file and stream bytes into
//! it, and to run a shell command on the remote host. [`SftpClient`] and
//! [`SftpSessionManager`] provide both over a real connection.
//!
//! [`SftpClient`]: crate::SftpClient
//! [`SftpSessionManager`]: crate::SftpSessionManager

use std::future::Future;
use std::io;

use crate::error::RemoteCommandError;

/// A remote file opened for writing
pub trait RemoteFile {
    /// Writes the whole buffer at the current end of the file
    fn write_all(&mut self, buf: &[u8]) -> impl Future<Output = io::Result<()>>;

    /// Flushes outstanding writes and releases the remote handle
    fn close(self) -> impl Future<Output = io::Result<()>>;
}

/// Remote file-creation interface
pub trait TransferEndpoint {
    type File: RemoteFile;

    /// Creates (or truncates) the file at `path` on the remote host
    fn create(&self, path: &str) -> impl Future<Output = io::Result<Self::File>>;
}

/// Remote command execution over an open connection
pub trait RemoteShell {
    /// Runs `command_line` in a fresh remote session and waits for it to exit.
    /// Succeeds only on a zero exit status.
    fn run(&self, command_line: &str) -> impl Future<Output = Result<(), RemoteCommandError>>;
}
