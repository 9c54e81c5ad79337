use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ArchiveError, TransferError};
use crate::operations::archive::archive;
use crate::operations::remote::{cleanup_command, expand_command};
use crate::operations::upload::upload;
use crate::transport::{RemoteShell, TransferEndpoint};
use crate::types::{
    RemoteTarget, SftpClientConfig, SourceDescriptor, TransferKind, TransferRequest,
    TransferSummary, archive_file_name,
};
use crate::utils::resolve_keeping_name;

/// Settings for a transfer run that do not come from the request itself
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Local directory the archive artifact is written to
    pub staging_dir: PathBuf,
    /// Upload chunk size in bytes
    pub io_size: usize,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("."),
            io_size: SftpClientConfig::DEFAULT_IO_SIZE,
        }
    }
}

/// Local archive artifact, removed from disk when dropped
///
/// Removal is best-effort: a failure is logged and otherwise ignored.
#[derive(Debug)]
struct LocalArchive {
    path: PathBuf,
}

impl Drop for LocalArchive {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed local archive {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove local archive {:?}: {}", self.path, e),
        }
    }
}

/// Inspects the source path and works out which transfer path applies
pub async fn describe_source(path: &Path) -> Result<SourceDescriptor, TransferError> {
    let not_found = |source: io::Error| TransferError::SourceNotFound {
        path: path.to_path_buf(),
        source,
    };
    let resolved = resolve_keeping_name(path).map_err(not_found)?;
    let metadata = tokio::fs::metadata(&resolved).await.map_err(not_found)?;
    let base_name = resolved
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| TransferError::InvalidSource(path.to_path_buf()))?;

    Ok(SourceDescriptor {
        path: resolved,
        is_directory: metadata.is_dir(),
        base_name,
    })
}

/// Drives one transfer from a local source to a remote destination
///
/// Plain files are streamed as-is. Directories are zipped into the staging
/// directory, uploaded as `<name>.zip`, expanded with `unzip` on the remote
/// host and the remote archive is then deleted. Steps run strictly one after
/// another and the first failure ends the run. The local archive is removed
/// on every exit path.
#[derive(Debug, Clone, Default)]
pub struct TransferOrchestrator {
    options: TransferOptions,
}

impl TransferOrchestrator {
    pub fn new(options: TransferOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Runs the transfer described by `request`
    ///
    /// # Errors
    ///
    /// - [`TransferError::SourceNotFound`] / [`TransferError::InvalidSource`]
    ///   if the source cannot be resolved
    /// - [`TransferError::StagingOccupied`] if the staged archive path already
    ///   exists; the existing file is left untouched
    /// - [`TransferError::ArchivalFailed`] if zipping a directory fails
    /// - [`TransferError::UploadFailed`] on any upload I/O error; no remote
    ///   command is issued afterwards
    /// - [`TransferError::RemoteExpandFailed`] if `unzip` fails; the remote
    ///   archive is left in place
    /// - [`TransferError::RemoteCleanupFailed`] if deleting the remote archive
    ///   fails after a successful expansion
    pub async fn run<S, E>(
        &self,
        request: &TransferRequest,
        shell: &S,
        endpoint: &E,
    ) -> Result<TransferSummary, TransferError>
    where
        S: RemoteShell,
        E: TransferEndpoint,
    {
        let source = describe_source(request.source_path()).await?;
        let target = RemoteTarget::new(request.destination_directory(), &source.remote_file_name());
        info!(
            "Transferring {:?} ({}) to {}",
            source.path,
            if source.is_directory { "directory" } else { "file" },
            target.path
        );

        if !source.is_directory {
            let progress = upload(endpoint, &source.path, &target.path, self.options.io_size).await?;
            return Ok(TransferSummary {
                source: source.path,
                remote_path: target.path,
                bytes_uploaded: progress.file_size,
                kind: TransferKind::Plain,
                commands: Vec::new(),
            });
        }

        let staged = self.options.staging_dir.join(archive_file_name(&source.base_name));
        // The guard deletes whatever sits at the staged path, so never adopt a
        // file this run did not create
        if !matches!(tokio::fs::try_exists(&staged).await, Ok(false)) {
            return Err(TransferError::StagingOccupied(staged));
        }
        // Guard is armed before the archiver runs so a partial archive goes too
        let local_archive = LocalArchive { path: staged };
        let source_dir = source.path.clone();
        let archive_path = local_archive.path.clone();
        let summary = tokio::task::spawn_blocking(move || archive(&source_dir, &archive_path))
            .await
            .map_err(|join_err| {
                TransferError::ArchivalFailed(ArchiveError::DestinationUnwritable {
                    path: local_archive.path.clone(),
                    source: io::Error::new(io::ErrorKind::Other, join_err.to_string()),
                })
            })??;
        debug!("Local archive ready: {:?} ({} bytes)", summary.path, summary.bytes);

        let progress = upload(endpoint, &local_archive.path, &target.path, self.options.io_size).await?;

        let mut commands = Vec::with_capacity(2);
        let expand = expand_command(&target.path);
        shell.run(&expand).await.map_err(TransferError::RemoteExpandFailed)?;
        commands.push(expand);

        let cleanup = cleanup_command(&source.base_name);
        shell.run(&cleanup).await.map_err(TransferError::RemoteCleanupFailed)?;
        commands.push(cleanup);

        info!("Directory {:?} expanded at {}", source.path, request.destination_directory());
        drop(local_archive);

        Ok(TransferSummary {
            source: source.path,
            remote_path: target.path,
            bytes_uploaded: progress.file_size,
            kind: TransferKind::Directory,
            commands,
        })
    }
}
