use std::io;
use std::path::PathBuf;

use openssh_sftp_client::Sftp;
use openssh_sftp_client::file::File;
use tracing::{debug, info};

use crate::error::TransferError;
use crate::operations::upload;
use crate::transport::{RemoteFile, TransferEndpoint};
use crate::types::{FileTransferProgress, SftpClientConfig};

/// SFTP client for writing files to a remote server
#[derive(Debug)]
pub struct SftpClient {
    pub(crate) sftp: Sftp,
    pub(crate) config: SftpClientConfig,
}

impl SftpClient {
    /// Creates a new SFTP client instance (internal use)
    pub(crate) fn new(sftp: Sftp, config: SftpClientConfig) -> Self {
        Self { sftp, config }
    }

    /// Chunk size used when streaming files through this client
    pub fn io_size(&self) -> usize {
        self.config.io_size
    }

    /// Closes the SFTP client and releases resources
    ///
    /// # Example
    ///
    /// ```ignore
    /// client.close().await?;
    /// ```
    pub async fn close(self) -> Result<(), anyhow::Error> {
        self.sftp.close().await?;
        Ok(())
    }

    /// Uploads a single local file to `remote_path`
    ///
    /// # Arguments
    ///
    /// * `local_path` - Path to the local file
    /// * `remote_path` - Destination path on the remote server
    ///
    /// # Example
    ///
    /// ```ignore
    /// let progress = client
    ///     .put("/local/file.txt".into(), "/remote/file.txt")
    ///     .await?;
    /// println!("{} bytes sent", progress.file_size);
    /// ```
    pub async fn put(
        &self,
        local_path: PathBuf,
        remote_path: &str,
    ) -> Result<FileTransferProgress, TransferError> {
        upload::upload(self, &local_path, remote_path, self.config.io_size).await
    }
}

/// Remote file created through [`SftpClient`]
pub struct SftpRemoteFile {
    inner: File,
}

fn sftp_io_error(err: openssh_sftp_client::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("SFTP error: {err:?}"))
}

impl RemoteFile for SftpRemoteFile {
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf).await.map_err(sftp_io_error)
    }

    async fn close(self) -> io::Result<()> {
        self.inner.close().await.map_err(sftp_io_error)
    }
}

impl TransferEndpoint for SftpClient {
    type File = SftpRemoteFile;

    async fn create(&self, path: &str) -> io::Result<SftpRemoteFile> {
        let inner = self.sftp.create(path).await.map_err(|err| {
            info!("Failed to create remote file: {:?} ERROR: {:?}", path, err);
            sftp_io_error(err)
        })?;
        debug!("Remote file handle opened: {:?}", path);
        Ok(SftpRemoteFile { inner })
    }
}
