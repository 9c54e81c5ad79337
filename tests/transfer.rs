use std::collections::HashMap;
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};
use zip::ZipArchive;
use zipdrop::{
    RemoteCommandError, RemoteFile, RemoteShell, TransferEndpoint, TransferError, TransferKind,
    TransferOptions, TransferOrchestrator, TransferRequest,
};

/// Remote filesystem kept in memory
#[derive(Default, Clone)]
struct MemoryEndpoint {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    /// Fail every write once this many bytes have been stored in a file
    fail_after: Option<usize>,
}

impl MemoryEndpoint {
    fn failing_after(bytes: usize) -> Self {
        Self {
            fail_after: Some(bytes),
            ..Self::default()
        }
    }

    fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }
}

struct MemoryFile {
    path: String,
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fail_after: Option<usize>,
}

impl RemoteFile for MemoryFile {
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut files = self.files.lock().unwrap();
        let data = files.entry(self.path.clone()).or_default();
        if let Some(limit) = self.fail_after {
            if data.len() + buf.len() > limit {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "connection reset"));
            }
        }
        data.extend_from_slice(buf);
        Ok(())
    }

    async fn close(self) -> io::Result<()> {
        Ok(())
    }
}

impl TransferEndpoint for MemoryEndpoint {
    type File = MemoryFile;

    async fn create(&self, path: &str) -> io::Result<MemoryFile> {
        self.files.lock().unwrap().insert(path.to_string(), Vec::new());
        Ok(MemoryFile {
            path: path.to_string(),
            files: self.files.clone(),
            fail_after: self.fail_after,
        })
    }
}

/// Records every command and fails those starting with `fail_prefix`
#[derive(Default)]
struct RecordingShell {
    commands: Mutex<Vec<String>>,
    fail_prefix: Option<&'static str>,
}

impl RecordingShell {
    fn failing_on(prefix: &'static str) -> Self {
        Self {
            fail_prefix: Some(prefix),
            ..Self::default()
        }
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl RemoteShell for RecordingShell {
    async fn run(&self, command_line: &str) -> Result<(), RemoteCommandError> {
        self.commands.lock().unwrap().push(command_line.to_string());
        match self.fail_prefix {
            Some(prefix) if command_line.starts_with(prefix) => {
                Err(RemoteCommandError::ExitStatus {
                    command: command_line.to_string(),
                    code: Some(1),
                    stderr: "simulated failure".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

struct Fixture {
    _root: TempDir,
    source_dir: PathBuf,
    staging: PathBuf,
}

impl Fixture {
    /// `reports/` with `a.txt` ("hello") and `sub/b.txt` ("world")
    fn reports() -> Self {
        let root = tempfile::tempdir().unwrap();
        let source_dir = root.path().join("reports");
        fs::create_dir_all(source_dir.join("sub")).unwrap();
        fs::write(source_dir.join("a.txt"), "hello").unwrap();
        fs::write(source_dir.join("sub").join("b.txt"), "world").unwrap();
        let staging = root.path().join("staging");
        fs::create_dir(&staging).unwrap();
        Self {
            _root: root,
            source_dir,
            staging,
        }
    }

    fn orchestrator(&self) -> TransferOrchestrator {
        TransferOrchestrator::new(TransferOptions {
            staging_dir: self.staging.clone(),
            io_size: 16,
        })
    }

    fn staged_archive(&self) -> PathBuf {
        self.staging.join("reports.zip")
    }

    fn file(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.source_dir.parent().unwrap().join(name);
        fs::write(&path, content).unwrap();
        path
    }
}

fn entry_names(archive: &[u8]) -> Vec<String> {
    let zip = ZipArchive::new(Cursor::new(archive)).unwrap();
    zip.file_names().map(str::to_string).collect::<Vec<_>>()
}

fn read_entry(archive: &[u8], name: &str) -> Vec<u8> {
    let mut zip = ZipArchive::new(Cursor::new(archive)).unwrap();
    let mut data = Vec::new();
    zip.by_name(name).unwrap().read_to_end(&mut data).unwrap();
    data
}

fn assert_no_local_archive(staging: &Path) {
    assert!(fs::metadata(staging.join("reports.zip")).is_err());
    assert_eq!(fs::read_dir(staging).unwrap().count(), 0);
}

#[tokio::test]
async fn directory_is_archived_uploaded_expanded_and_cleaned_up() {
    let fx = Fixture::reports();
    let endpoint = MemoryEndpoint::default();
    let shell = RecordingShell::default();
    let request = TransferRequest::new(&fx.source_dir, "/data/");

    let summary = assert_ok!(fx.orchestrator().run(&request, &shell, &endpoint).await);

    assert_eq!(summary.kind, TransferKind::Directory);
    assert_eq!(summary.remote_path, "/data/reports.zip");
    assert_eq!(
        shell.commands(),
        vec!["unzip /data/reports.zip".to_string(), "rm reports.zip".to_string()]
    );
    assert_eq!(summary.commands, shell.commands());

    let uploaded = endpoint.file("/data/reports.zip").expect("archive uploaded");
    assert_eq!(uploaded.len() as u64, summary.bytes_uploaded);
    let mut names = entry_names(&uploaded);
    names.sort();
    assert_eq!(
        names,
        vec!["reports/", "reports/a.txt", "reports/sub/", "reports/sub/b.txt"]
    );
    assert_eq!(read_entry(&uploaded, "reports/a.txt"), b"hello");
    assert_eq!(read_entry(&uploaded, "reports/sub/b.txt"), b"world");

    assert_no_local_archive(&fx.staging);
}

#[tokio::test]
async fn plain_file_is_uploaded_without_remote_commands() {
    let fx = Fixture::reports();
    let notes = fx.file("notes.txt", b"meeting notes\n");
    let endpoint = MemoryEndpoint::default();
    let shell = RecordingShell::default();
    let request = TransferRequest::new(&notes, "/data/");

    let summary = assert_ok!(fx.orchestrator().run(&request, &shell, &endpoint).await);

    assert_eq!(summary.kind, TransferKind::Plain);
    assert_eq!(summary.remote_path, "/data/notes.txt");
    assert_eq!(endpoint.file("/data/notes.txt").unwrap(), b"meeting notes\n");
    assert!(shell.commands().is_empty());
    assert!(summary.commands.is_empty());
    assert_no_local_archive(&fx.staging);
}

#[tokio::test]
async fn zip_named_plain_file_is_not_expanded() {
    let fx = Fixture::reports();
    let bundle = fx.file("bundle.zip", b"PK not really a zip");
    let endpoint = MemoryEndpoint::default();
    let shell = RecordingShell::default();

    let summary = assert_ok!(
        fx.orchestrator()
            .run(&TransferRequest::new(&bundle, "/data/"), &shell, &endpoint)
            .await
    );

    assert_eq!(summary.remote_path, "/data/bundle.zip");
    assert_eq!(endpoint.file("/data/bundle.zip").unwrap(), b"PK not really a zip");
    assert!(shell.commands().is_empty());
}

#[tokio::test]
async fn upload_failure_issues_no_remote_commands() {
    let fx = Fixture::reports();
    let endpoint = MemoryEndpoint::failing_after(32);
    let shell = RecordingShell::default();
    let request = TransferRequest::new(&fx.source_dir, "/data/");

    let err = assert_err!(fx.orchestrator().run(&request, &shell, &endpoint).await);

    match err {
        TransferError::UploadFailed { remote, source, .. } => {
            assert_eq!(remote, "/data/reports.zip");
            assert_eq!(source.kind(), io::ErrorKind::BrokenPipe);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(shell.commands().is_empty());
    // Partial remote file stays behind
    let partial = endpoint.file("/data/reports.zip").unwrap();
    assert!(!partial.is_empty() && partial.len() <= 32);
    assert_no_local_archive(&fx.staging);
}

#[tokio::test]
async fn expand_failure_skips_cleanup_and_keeps_remote_archive() {
    let fx = Fixture::reports();
    let endpoint = MemoryEndpoint::default();
    let shell = RecordingShell::failing_on("unzip");
    let request = TransferRequest::new(&fx.source_dir, "/data/");

    let err = assert_err!(fx.orchestrator().run(&request, &shell, &endpoint).await);

    match &err {
        TransferError::RemoteExpandFailed(cause) => {
            assert_eq!(cause.command(), "unzip /data/reports.zip");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(shell.commands(), vec!["unzip /data/reports.zip".to_string()]);
    assert!(endpoint.file("/data/reports.zip").is_some());
    assert_no_local_archive(&fx.staging);
}

#[tokio::test]
async fn cleanup_failure_is_reported_after_expansion() {
    let fx = Fixture::reports();
    let endpoint = MemoryEndpoint::default();
    let shell = RecordingShell::failing_on("rm");
    let request = TransferRequest::new(&fx.source_dir, "/data/");

    let err = assert_err!(fx.orchestrator().run(&request, &shell, &endpoint).await);

    assert!(matches!(err, TransferError::RemoteCleanupFailed(_)));
    assert_eq!(
        shell.commands(),
        vec!["unzip /data/reports.zip".to_string(), "rm reports.zip".to_string()]
    );
    assert_no_local_archive(&fx.staging);
}

#[tokio::test]
async fn missing_source_touches_nothing() {
    let fx = Fixture::reports();
    let endpoint = MemoryEndpoint::default();
    let shell = RecordingShell::default();
    let request = TransferRequest::new(fx.source_dir.join("missing"), "/data/");

    let err = assert_err!(fx.orchestrator().run(&request, &shell, &endpoint).await);

    assert!(matches!(err, TransferError::SourceNotFound { .. }));
    assert!(endpoint.files.lock().unwrap().is_empty());
    assert!(shell.commands().is_empty());
}

#[tokio::test]
async fn archival_failure_removes_partial_archive() {
    let fx = Fixture::reports();
    let endpoint = MemoryEndpoint::default();
    let shell = RecordingShell::default();
    let request = TransferRequest::new(&fx.source_dir, "/data/");
    let orchestrator = TransferOrchestrator::new(TransferOptions {
        staging_dir: fx.staging.join("does-not-exist"),
        io_size: 16,
    });

    let err = assert_err!(orchestrator.run(&request, &shell, &endpoint).await);

    assert!(matches!(err, TransferError::ArchivalFailed(_)));
    assert!(endpoint.files.lock().unwrap().is_empty());
    assert!(shell.commands().is_empty());
    assert!(!fx.staged_archive().exists());
}

#[cfg(unix)]
#[tokio::test]
async fn unreadable_entry_fails_archival_and_cleans_staging() {
    let fx = Fixture::reports();
    std::os::unix::fs::symlink(fx.source_dir.join("nowhere"), fx.source_dir.join("dangling"))
        .unwrap();
    let endpoint = MemoryEndpoint::default();
    let shell = RecordingShell::default();
    let request = TransferRequest::new(&fx.source_dir, "/data/");

    let err = assert_err!(fx.orchestrator().run(&request, &shell, &endpoint).await);

    assert!(matches!(
        err,
        TransferError::ArchivalFailed(zipdrop::ArchiveError::EntryReadFailed { .. })
    ));
    assert!(endpoint.files.lock().unwrap().is_empty());
    assert_no_local_archive(&fx.staging);
}

#[tokio::test]
async fn destination_is_concatenated_verbatim() {
    let fx = Fixture::reports();
    let notes = fx.file("notes.txt", b"n");
    let endpoint = MemoryEndpoint::default();
    let shell = RecordingShell::default();

    let summary = assert_ok!(
        fx.orchestrator()
            .run(&TransferRequest::new(&notes, "/data"), &shell, &endpoint)
            .await
    );

    assert_eq!(summary.remote_path, "/datanotes.txt");
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_directory_is_sent_under_the_link_name() {
    let fx = Fixture::reports();
    let current = fx.source_dir.parent().unwrap().join("current");
    std::os::unix::fs::symlink(&fx.source_dir, &current).unwrap();
    let endpoint = MemoryEndpoint::default();
    let shell = RecordingShell::default();

    let summary = assert_ok!(
        fx.orchestrator()
            .run(&TransferRequest::new(&current, "/data/"), &shell, &endpoint)
            .await
    );

    assert_eq!(summary.remote_path, "/data/current.zip");
    assert_eq!(
        shell.commands(),
        vec!["unzip /data/current.zip".to_string(), "rm current.zip".to_string()]
    );
    let uploaded = endpoint.file("/data/current.zip").expect("archive uploaded");
    let mut names = entry_names(&uploaded);
    names.sort();
    assert_eq!(
        names,
        vec!["current/", "current/a.txt", "current/sub/", "current/sub/b.txt"]
    );
    assert_eq!(fs::read_dir(&fx.staging).unwrap().count(), 0);
}

#[tokio::test]
async fn existing_file_at_staged_path_is_left_alone() {
    let fx = Fixture::reports();
    fs::write(fx.staged_archive(), b"someone else's archive").unwrap();
    let endpoint = MemoryEndpoint::default();
    let shell = RecordingShell::default();
    let request = TransferRequest::new(&fx.source_dir, "/data/");

    let err = assert_err!(fx.orchestrator().run(&request, &shell, &endpoint).await);

    match err {
        TransferError::StagingOccupied(path) => assert_eq!(path, fx.staged_archive()),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fs::read(fx.staged_archive()).unwrap(), b"someone else's archive");
    assert!(endpoint.files.lock().unwrap().is_empty());
    assert!(shell.commands().is_empty());
}
