use bytes::BytesMut;
use std::io;
use std::path::Path;
use std::time::Instant;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{error, info};

use crate::error::TransferError;
use crate::transport::{RemoteFile, TransferEndpoint};
use crate::types::FileTransferProgress;

/// Streams a local file to a newly created remote file
///
/// Chunks of at most `io_size` bytes are read from the local file and written
/// to the remote file strictly in order; the next chunk is only read once the
/// previous one has been written. The remote file is closed once the local
/// file is exhausted.
///
/// # Arguments
///
/// * `endpoint` - Remote file-creation interface
/// * `local_path` - Path to the local file to upload
/// * `remote_path` - Destination path on the remote server
/// * `io_size` - Maximum chunk size in bytes
///
/// # Errors
///
/// Every failure is reported as [`TransferError::UploadFailed`]:
/// - The local file cannot be opened or read
/// - The remote file cannot be created, written to or closed
///
/// A partially written remote file is left in place.
pub async fn upload<E: TransferEndpoint>(
    endpoint: &E,
    local_path: &Path,
    remote_path: &str,
    io_size: usize,
) -> Result<FileTransferProgress, TransferError> {
    let upload_failed = |source: io::Error| TransferError::UploadFailed {
        local: local_path.to_path_buf(),
        remote: remote_path.to_string(),
        source,
    };

    let upload_time = Instant::now();
    let mut local_file = fs::File::open(local_path).await.map_err(upload_failed)?;
    info!("Local file opened: {:?}", local_path);

    let mut remote_file = endpoint.create(remote_path).await.map_err(upload_failed)?;
    info!("Remote file created path: {:?}", remote_path);

    let mut written: u64 = 0;
    let mut buffer = BytesMut::with_capacity(io_size.max(1));
    loop {
        buffer.clear();
        let bytes_read = match local_file.read_buf(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                error!("Error reading local file: {:?}", e);
                return Err(upload_failed(e));
            }
        };
        remote_file.write_all(&buffer[..bytes_read]).await.map_err(|e| {
            error!("Error writing remote file {:?}: {:?}", remote_path, e);
            upload_failed(e)
        })?;
        written += bytes_read as u64;
    }
    remote_file.close().await.map_err(upload_failed)?;

    info!(
        "File {:?} uploaded ({} bytes). Time taken {:?}",
        local_path,
        written,
        upload_time.elapsed(),
    );

    Ok(FileTransferProgress {
        src_file: local_path.to_path_buf(),
        dest_file: remote_path.to_string(),
        file_size: written,
    })
}
