/// Zipping a local directory into a single archive file
pub(crate) mod archive;

/// Shell commands run on the remote host
pub(crate) mod remote;

/// Sequencing of archive, upload, expand and cleanup
pub(crate) mod transfer;

/// Streaming a local file to the remote server
pub(crate) mod upload;
