//! Persisted organize trail.
//!
//! Layout: `<root>/.undo/<label>/<file name>`, one plain-text file per moved
//! entry whose whole content is the entry's original absolute path, stored as
//! raw path bytes. The file currently lives at `<root>/<label>/<file name>`.

use serde::Serialize;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::TRAIL_DIR;
use crate::error::FsError;

/// One trail file read back from disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrailRecord {
    pub trail_file: PathBuf,
    pub label: String,
    /// Where the file was before organize moved it
    pub original: PathBuf,
    /// Where organize put it
    pub current: PathBuf,
}

/// Outcome of replaying a trail
#[derive(Debug, Default)]
pub struct UndoOrganizeResult {
    pub files_restored: usize,
    pub errors: Vec<FsError>,
}

pub fn trail_dir(root: &Path) -> PathBuf {
    root.join(TRAIL_DIR)
}

pub(super) fn write_record(root: &Path, label: &str, name: &OsStr, original: &Path) -> io::Result<()> {
    let dir = trail_dir(root).join(label);
    fs::create_dir_all(&dir)?;
    fs::write(dir.join(name), path_to_bytes(original))
}

#[cfg(unix)]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

/// Read every trail file under `root`. A missing trail directory is empty.
pub fn read_trail(root: &Path) -> Result<(Vec<TrailRecord>, Vec<FsError>), FsError> {
    let trail = trail_dir(root);
    let mut records = Vec::new();
    let mut errors = Vec::new();

    let labels = match fs::read_dir(&trail) {
        Ok(labels) => labels,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((records, errors)),
        Err(e) => return Err(FsError::root_unavailable(&trail, e)),
    };

    for label_entry in labels {
        let label_entry = match label_entry {
            Ok(entry) => entry,
            Err(e) => {
                errors.push(FsError::entry_unreadable(&trail, e));
                continue;
            }
        };
        let label_dir = label_entry.path();
        if !label_dir.is_dir() {
            continue;
        }
        let label = label_entry.file_name().to_string_lossy().to_string();

        let files = match fs::read_dir(&label_dir) {
            Ok(files) => files,
            Err(e) => {
                errors.push(FsError::entry_unreadable(&label_dir, e));
                continue;
            }
        };
        for file_entry in files {
            let trail_file = match file_entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    errors.push(FsError::entry_unreadable(&label_dir, e));
                    continue;
                }
            };
            match fs::read(&trail_file) {
                Ok(content) => {
                    let name = trail_file.file_name().unwrap_or_default();
                    let end = content.iter().rposition(|b| *b != b'\n').map_or(0, |i| i + 1);
                    records.push(TrailRecord {
                        current: root.join(&label).join(name),
                        original: path_from_bytes(&content[..end]),
                        label: label.clone(),
                        trail_file,
                    });
                }
                Err(e) => errors.push(FsError::entry_unreadable(&trail_file, e)),
            }
        }
    }

    records.sort_by(|a, b| a.trail_file.cmp(&b.trail_file));
    Ok((records, errors))
}

/// Move every organized file back to its recorded location.
///
/// Restored entries lose their trail file; a failed entry keeps it so the
/// command can be retried. Empty label and trail directories are pruned.
pub async fn undo_organize(directory: &Path) -> Result<UndoOrganizeResult, FsError> {
    let root = directory
        .canonicalize()
        .map_err(|e| FsError::root_unavailable(directory, e))?;

    tokio::task::spawn_blocking(move || replay(&root))
        .await
        .map_err(|e| FsError::TaskFailed(e.to_string()))?
}

fn replay(root: &Path) -> Result<UndoOrganizeResult, FsError> {
    let (records, errors) = read_trail(root)?;
    let mut result = UndoOrganizeResult {
        files_restored: 0,
        errors,
    };

    let mut labels: Vec<&str> = Vec::new();
    for record in &records {
        match restore(record) {
            Ok(()) => {
                tracing::debug!(
                    from = %record.current.display(),
                    to = %record.original.display(),
                    "Restored organized file"
                );
                result.files_restored += 1;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Could not restore organized file");
                result.errors.push(err);
            }
        }
        if !labels.contains(&record.label.as_str()) {
            labels.push(&record.label);
        }
    }

    // remove_dir only succeeds on empty directories
    for label in labels {
        let _ = fs::remove_dir(trail_dir(root).join(label));
        let _ = fs::remove_dir(root.join(label));
    }
    let _ = fs::remove_dir(trail_dir(root));

    tracing::info!(
        root = %root.display(),
        restored = result.files_restored,
        errors = result.errors.len(),
        "Undo organize finished"
    );
    Ok(result)
}

fn restore(record: &TrailRecord) -> Result<(), FsError> {
    if fs::symlink_metadata(&record.original).is_ok() {
        return Err(FsError::mutation_failed(
            "restore",
            &record.original,
            io::Error::new(io::ErrorKind::AlreadyExists, "original location is occupied"),
        ));
    }
    if let Some(parent) = record.original.parent() {
        fs::create_dir_all(parent).map_err(|e| FsError::mutation_failed("restore", parent, e))?;
    }
    fs::rename(&record.current, &record.original)
        .map_err(|e| FsError::mutation_failed("restore", &record.current, e))?;
    fs::remove_file(&record.trail_file)
        .map_err(|e| FsError::mutation_failed("remove trail", &record.trail_file, e))
}
