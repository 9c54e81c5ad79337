use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ArchiveError;
use crate::utils::resolve_keeping_name;

const READ_CHUNK: usize = 64 * 1024;

/// What a finished archive contains
#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    /// Entry names in the order they were written
    pub entries: Vec<String>,
    /// Size of the archive file in bytes
    pub bytes: u64,
}

/// Zips `source_dir` into a new archive at `output`
///
/// Entries are named relative to the parent of `source_dir`, so every entry
/// starts with the directory's own name. Directories are walked depth-first
/// with siblings sorted by file name, which keeps the entry order identical
/// between runs over the same tree.
///
/// Directory entries end with `/` and carry no data. Files are stored
/// deflated, with their modification time and (on Unix) permission bits.
///
/// On failure after `output` has been created, the partial archive is left
/// on disk for the caller to remove.
pub fn archive(source_dir: &Path, output: &Path) -> Result<ArchiveSummary, ArchiveError> {
    let metadata = fs::metadata(source_dir).map_err(|source| ArchiveError::SourceUnreadable {
        path: source_dir.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(ArchiveError::SourceUnreadable {
            path: source_dir.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        });
    }
    // Entry names are computed against the parent, which `..`-style or bare
    // relative paths do not expose. A symlinked source keeps its own name.
    let source_dir = resolve_keeping_name(source_dir).map_err(|source| {
        ArchiveError::SourceUnreadable {
            path: source_dir.to_path_buf(),
            source,
        }
    })?;
    let base = source_dir.parent().unwrap_or(&source_dir).to_path_buf();

    let unwritable = |source: io::Error| ArchiveError::DestinationUnwritable {
        path: output.to_path_buf(),
        source,
    };

    let file = File::create(output).map_err(unwritable)?;
    // An archive staged inside the source tree must not archive itself
    let output_abs = fs::canonicalize(output).map_err(unwritable)?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let mut entries = Vec::new();

    let walker = WalkDir::new(&source_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.file_name() != output_abs.file_name().unwrap_or_default()
                || fs::canonicalize(entry.path()).map_or(true, |path| path != output_abs)
        });
    for entry in walker {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(&source_dir).to_path_buf();
            ArchiveError::EntryReadFailed {
                path,
                source: err.into(),
            }
        })?;
        let path = entry.path();
        // The root may be a symlink to a directory
        let is_dir = entry.depth() == 0 || entry.file_type().is_dir();
        let mut name = entry_name(&base, path);
        let options = entry_options(&entry);

        if is_dir {
            name.push('/');
            writer
                .add_directory(name.clone(), options)
                .map_err(|err| unwritable(err.into()))?;
        } else {
            let mut source = File::open(path).map_err(|source| ArchiveError::EntryReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
            writer
                .start_file(name.clone(), options)
                .map_err(|err| unwritable(err.into()))?;
            copy_entry(&mut source, &mut writer, path, output)?;
        }
        debug!("Archived entry {:?}", name);
        entries.push(name);
    }

    let mut inner = writer.finish().map_err(|err| unwritable(err.into()))?;
    inner.flush().map_err(unwritable)?;
    drop(inner);

    let bytes = fs::metadata(output).map_err(unwritable)?.len();
    info!(
        "Archived {:?} into {:?}: {} entries, {} bytes",
        source_dir,
        output,
        entries.len(),
        bytes
    );
    Ok(ArchiveSummary {
        path: output.to_path_buf(),
        entries,
        bytes,
    })
}

/// Builds the `/`-separated entry name of `path` relative to `base`
fn entry_name(base: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn entry_options(entry: &walkdir::DirEntry) -> SimpleFileOptions {
    let mut options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let Ok(metadata) = entry.metadata() else {
        return options;
    };
    if let Some(modified) = metadata
        .modified()
        .ok()
        .and_then(|mtime| zip::DateTime::try_from(time::OffsetDateTime::from(mtime)).ok())
    {
        options = options.last_modified_time(modified);
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        options = options.unix_permissions(metadata.permissions().mode() & 0o7777);
    }
    options
}

/// Copies one file into the current archive entry, telling read failures
/// (the entry) apart from write failures (the archive).
fn copy_entry<W: Write + io::Seek>(
    source: &mut File,
    writer: &mut ZipWriter<W>,
    path: &Path,
    output: &Path,
) -> Result<(), ArchiveError> {
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(ArchiveError::EntryReadFailed {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        writer
            .write_all(&buf[..n])
            .map_err(|source| ArchiveError::DestinationUnwritable {
                path: output.to_path_buf(),
                source,
            })?;
    }
}
