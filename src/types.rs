use std::path::{Path, PathBuf};

/// Suffix appended to a directory's base name to name its archive
pub const ARCHIVE_SUFFIX: &str = ".zip";

/// One source path to send to one destination directory
///
/// Built once from configuration and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    source_path: PathBuf,
    destination_directory: String,
}

impl TransferRequest {
    /// Creates a new request
    ///
    /// `destination_directory` is used verbatim as the prefix of the remote
    /// path, so it is expected to end with the remote host's path separator.
    pub fn new(source_path: impl Into<PathBuf>, destination_directory: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            destination_directory: destination_directory.into(),
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn destination_directory(&self) -> &str {
        &self.destination_directory
    }
}

/// What the source path turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Resolved absolute form of the source path
    pub path: PathBuf,
    pub is_directory: bool,
    /// Final path component of the resolved source
    pub base_name: String,
}

impl SourceDescriptor {
    /// File name used on the remote host: the base name itself for a plain
    /// file, `<base name>.zip` for a directory.
    pub fn remote_file_name(&self) -> String {
        if self.is_directory {
            archive_file_name(&self.base_name)
        } else {
            self.base_name.clone()
        }
    }
}

/// Name of the archive built from a directory called `base_name`
pub fn archive_file_name(base_name: &str) -> String {
    format!("{base_name}{ARCHIVE_SUFFIX}")
}

/// Full remote path a source lands at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub path: String,
}

impl RemoteTarget {
    /// Plain concatenation of the destination directory and the file name.
    /// No separator is inserted.
    pub fn new(destination_directory: &str, file_name: &str) -> Self {
        Self {
            path: format!("{destination_directory}{file_name}"),
        }
    }
}

/// Configuration for SFTP client operations
#[derive(Debug, Clone)]
pub struct SftpClientConfig {
    /// Buffer size for read/write operations in bytes
    pub io_size: usize,
}

impl SftpClientConfig {
    /// Default chunk size used when streaming files
    pub const DEFAULT_IO_SIZE: usize = 65536;

    /// Creates a new configuration with a custom chunk size
    pub fn new(io_size: usize) -> Self {
        Self { io_size }
    }
}

impl Default for SftpClientConfig {
    fn default() -> Self {
        Self {
            io_size: Self::DEFAULT_IO_SIZE,
        }
    }
}

/// Result of a completed single-file upload
#[derive(Debug, Clone)]
pub struct FileTransferProgress {
    /// Source file path
    pub src_file: PathBuf,
    /// Destination file path
    pub dest_file: String,
    /// Number of bytes written to the destination
    pub file_size: u64,
}

/// Which of the two transfer paths a run took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Single file uploaded as-is
    Plain,
    /// Directory archived, uploaded and expanded remotely
    Directory,
}

/// Outcome of a successful transfer run
#[derive(Debug, Clone)]
pub struct TransferSummary {
    pub source: PathBuf,
    pub remote_path: String,
    pub bytes_uploaded: u64,
    pub kind: TransferKind,
    /// Remote commands issued, in order
    pub commands: Vec<String>,
}
