use tracing::{debug, info, warn};

use crate::error::RemoteCommandError;
use crate::types::archive_file_name;

/// Command that expands an uploaded archive on the remote host
pub fn expand_command(remote_archive_path: &str) -> String {
    format!("unzip {remote_archive_path}")
}

/// Command that deletes the uploaded archive once it has been expanded
pub fn cleanup_command(base_name: &str) -> String {
    format!("rm {}", archive_file_name(base_name))
}

/// Runs one command line on the remote host and waits for it to finish
///
/// The command gets its own session on the multiplexed connection. The
/// spawned child is owned by this call and released on every return path.
///
/// # Errors
///
/// - [`RemoteCommandError::Session`] if the session cannot be opened or the
///   transport fails while waiting
/// - [`RemoteCommandError::ExitStatus`] if the command exits non-zero
pub async fn run_remote_command(
    session: &openssh::Session,
    command_line: &str,
) -> Result<(), RemoteCommandError> {
    info!("Running remote command: {}", command_line);
    let output = session
        .raw_command(command_line)
        .output()
        .await
        .map_err(|source| RemoteCommandError::Session {
            command: command_line.to_string(),
            source,
        })?;

    if !output.stdout.is_empty() {
        debug!(
            "`{}` stdout: {}",
            command_line,
            String::from_utf8_lossy(&output.stdout).trim_end()
        );
    }

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
    warn!(
        "Remote command `{}` failed with {:?}: {}",
        command_line,
        output.status.code(),
        stderr
    );
    Err(RemoteCommandError::ExitStatus {
        command: command_line.to_string(),
        code: output.status.code(),
        stderr,
    })
}
