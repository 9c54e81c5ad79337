use std::fs;
use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use tracing::warn;

/// How often the SFTP client probes the ssh master connection
const LIVENESS_INTERVAL: Duration = Duration::from_secs(10);

/// Liveness probe handed to the SFTP client.
///
/// Resolves only once the ssh master stops answering, at which point the
/// SFTP client fails whatever upload is still in flight instead of hanging.
pub fn check_connection<'session>(
    session: &'session openssh::Session,
) -> Pin<Box<dyn Future<Output = Result<(), openssh::Error>> + Send + Sync + 'session>> {
    Box::pin(async move {
        loop {
            tokio::time::sleep(LIVENESS_INTERVAL).await;
            if let Err(err) = session.check().await {
                warn!("ssh master connection lost: {}", err);
                return Err(err);
            }
        }
    })
}

/// Makes `path` absolute without resolving its final component.
///
/// `.` and `..` segments are folded lexically and the parent directory is
/// canonicalized, but a symlink named by the path itself keeps its own name.
/// Fails if the parent directory does not exist.
pub fn resolve_keeping_name(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    match (normalized.parent(), normalized.file_name()) {
        (Some(parent), Some(name)) => Ok(fs::canonicalize(parent)?.join(name)),
        _ => Ok(normalized),
    }
}
