//! Single-entry mutations. Each one records its inverse in the `ActionLog`
//! after it has been applied, so `undo` can reverse it.

use chrono::Local;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::FsError;
use crate::history::{Action, ActionLog};
use crate::search::find_temporary_files;
use crate::traversal::Walker;

fn occupied(operation: &'static str, path: &Path) -> FsError {
    FsError::mutation_failed(
        operation,
        path,
        io::Error::new(io::ErrorKind::AlreadyExists, "destination already exists"),
    )
}

/// Remove a file or an empty directory
///
/// Files are read fully first so the deletion can be undone byte for byte.
/// Non-empty directories and symbolic links are refused.
pub fn remove_path(path: &Path, log: &ActionLog) -> Result<(), FsError> {
    let metadata = fs::symlink_metadata(path).map_err(|e| FsError::entry_unreadable(path, e))?;

    // The undo log stores file bytes, which cannot recreate a link
    if metadata.file_type().is_symlink() {
        return Err(FsError::mutation_failed(
            "remove",
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "symbolic links cannot be removed"),
        ));
    }

    if metadata.is_dir() {
        let mut children = fs::read_dir(path).map_err(|e| FsError::entry_unreadable(path, e))?;
        if children.next().is_some() {
            return Err(FsError::mutation_failed(
                "remove",
                path,
                io::Error::other("directory is not empty; only empty directories can be removed"),
            ));
        }
        fs::remove_dir(path).map_err(|e| FsError::mutation_failed("remove", path, e))?;
        log.push(Action::Delete {
            path: path.to_path_buf(),
            content: None,
        });
    } else {
        let content = fs::read(path).map_err(|e| FsError::entry_unreadable(path, e))?;
        fs::remove_file(path).map_err(|e| FsError::mutation_failed("remove", path, e))?;
        log.push(Action::Delete {
            path: path.to_path_buf(),
            content: Some(content),
        });
    }

    tracing::info!(path = %path.display(), "Removed");
    Ok(())
}

/// Rename `source` to `destination`, refusing to overwrite
pub fn move_path(source: &Path, destination: &Path, log: &ActionLog) -> Result<(), FsError> {
    fs::symlink_metadata(source).map_err(|e| FsError::entry_unreadable(source, e))?;
    if fs::symlink_metadata(destination).is_ok() {
        return Err(occupied("move", destination));
    }

    fs::rename(source, destination).map_err(|e| FsError::mutation_failed("move", source, e))?;
    log.push(Action::Move {
        source: source.to_path_buf(),
        destination: destination.to_path_buf(),
    });

    tracing::info!(from = %source.display(), to = %destination.display(), "Moved");
    Ok(())
}

/// Create one directory (the parent must exist)
pub fn make_dir(path: &Path, log: &ActionLog) -> Result<(), FsError> {
    fs::create_dir(path).map_err(|e| FsError::mutation_failed("mkdir", path, e))?;
    log.push(Action::Create {
        path: path.to_path_buf(),
        content: None,
    });
    Ok(())
}

/// `<stem>_<YYYYmmdd_HHMMSS><.ext>` next to the original
pub fn backup_name(path: &Path, stamp: &str) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_string_lossy();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    Some(path.with_file_name(format!("{stem}_{stamp}{ext}")))
}

/// Rename a file to a timestamped backup name; returns the new path
pub fn backup_file(path: &Path, log: &ActionLog) -> Result<PathBuf, FsError> {
    let metadata = fs::symlink_metadata(path).map_err(|e| FsError::entry_unreadable(path, e))?;
    if !metadata.is_file() {
        return Err(FsError::mutation_failed(
            "backup",
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "only regular files can be backed up"),
        ));
    }

    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let backup = backup_name(path, &stamp).ok_or_else(|| {
        FsError::mutation_failed(
            "backup",
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        )
    })?;
    if fs::symlink_metadata(&backup).is_ok() {
        return Err(occupied("backup", &backup));
    }

    fs::rename(path, &backup).map_err(|e| FsError::mutation_failed("backup", path, e))?;
    log.push(Action::Move {
        source: path.to_path_buf(),
        destination: backup.clone(),
    });

    tracing::info!(from = %path.display(), to = %backup.display(), "Backed up");
    Ok(backup)
}

/// What `clean_temporary_files` found and did
#[derive(Debug, Default)]
pub struct CleanReport {
    pub found: Vec<PathBuf>,
    pub removed: usize,
    pub errors: Vec<FsError>,
}

/// List temporary files under `root`; with `delete`, remove each one through
/// `remove_path` so every deletion is undoable
pub async fn clean_temporary_files(
    root: &Path,
    delete: bool,
    walker: &Walker,
    log: &ActionLog,
) -> Result<CleanReport, FsError> {
    let found = find_temporary_files(root, walker).await?;
    let mut report = CleanReport::default();

    if delete {
        for path in &found {
            match remove_path(path, log) {
                Ok(()) => report.removed += 1,
                Err(err) => {
                    tracing::warn!(error = %err, "Could not remove temporary file");
                    report.errors.push(err);
                }
            }
        }
    }

    report.found = found;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{ActionKind, UndoOutcome};
    use tempfile::TempDir;

    #[test]
    fn test_remove_file_then_undo() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.txt");
        fs::write(&path, "precious").unwrap();
        let log = ActionLog::new();

        remove_path(&path, &log).unwrap();
        assert!(!path.exists());
        assert_eq!(log.len(), 1);

        assert!(matches!(log.undo().unwrap(), UndoOutcome::Undone(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "precious");
    }

    #[test]
    fn test_remove_empty_directory_then_undo() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("empty");
        fs::create_dir(&dir).unwrap();
        let log = ActionLog::new();

        remove_path(&dir, &log).unwrap();
        assert!(!dir.exists());

        log.undo().unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_remove_refuses_non_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("full");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("child"), "x").unwrap();
        let log = ActionLog::new();

        let err = remove_path(&dir, &log).unwrap_err();
        assert!(matches!(err, FsError::MutationFailed { .. }));
        assert!(dir.join("child").exists());
        assert!(log.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_remove_refuses_symlinks() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("target.txt");
        fs::write(&target, "kept").unwrap();
        let live = temp_dir.path().join("live");
        let dangling = temp_dir.path().join("dangling");
        std::os::unix::fs::symlink(&target, &live).unwrap();
        std::os::unix::fs::symlink(temp_dir.path().join("gone"), &dangling).unwrap();
        let log = ActionLog::new();

        for link in [&live, &dangling] {
            let err = remove_path(link, &log).unwrap_err();
            assert_eq!(err.io_kind(), Some(io::ErrorKind::InvalidInput));
            assert!(fs::symlink_metadata(link).unwrap().file_type().is_symlink());
        }
        assert_eq!(fs::read_to_string(&target).unwrap(), "kept");
        assert!(log.is_empty());
    }

    #[test]
    fn test_move_refuses_occupied_destination() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a");
        let b = temp_dir.path().join("b");
        fs::write(&a, "a").unwrap();
        fs::write(&b, "b").unwrap();
        let log = ActionLog::new();

        assert!(move_path(&a, &b, &log).is_err());
        assert_eq!(fs::read_to_string(&b).unwrap(), "b");
        assert!(log.is_empty());
    }

    #[test]
    fn test_move_then_undo() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a");
        let b = temp_dir.path().join("b");
        fs::write(&a, "a").unwrap();
        let log = ActionLog::new();

        move_path(&a, &b, &log).unwrap();
        assert!(b.exists() && !a.exists());

        log.undo().unwrap();
        assert!(a.exists() && !b.exists());
    }

    #[test]
    fn test_make_dir_records_create() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("new");
        let log = ActionLog::new();

        make_dir(&dir, &log).unwrap();
        assert!(dir.is_dir());
        assert!(make_dir(&dir, &log).is_err());
        assert_eq!(log.len(), 1);

        match log.undo().unwrap() {
            UndoOutcome::Undone(action) => assert_eq!(action.kind(), ActionKind::Create),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(!dir.exists());
    }

    #[test]
    fn test_backup_name() {
        assert_eq!(
            backup_name(Path::new("/d/report.pdf"), "20240101_120000"),
            Some(PathBuf::from("/d/report_20240101_120000.pdf"))
        );
        assert_eq!(
            backup_name(Path::new("/d/Makefile"), "20240101_120000"),
            Some(PathBuf::from("/d/Makefile_20240101_120000"))
        );
    }

    #[test]
    fn test_backup_file_then_undo() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("report.pdf");
        fs::write(&path, "%PDF").unwrap();
        let log = ActionLog::new();

        let backup = backup_file(&path, &log).unwrap();
        assert!(!path.exists());
        assert!(backup.exists());
        let name = backup.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("report_") && name.ends_with(".pdf"));

        log.undo().unwrap();
        assert!(path.exists());
        assert!(!backup.exists());
    }

    #[tokio::test]
    async fn test_clean_temporary_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("logs")).unwrap();
        fs::write(root.join("keep.txt"), "k").unwrap();
        fs::write(root.join("scratch.tmp"), "t").unwrap();
        fs::write(root.join("logs/run.log"), "l").unwrap();
        let log = ActionLog::new();

        let listed = clean_temporary_files(root, false, &Walker::fanout(2), &log)
            .await
            .unwrap();
        assert_eq!(listed.found.len(), 2);
        assert_eq!(listed.removed, 0);
        assert!(root.join("scratch.tmp").exists());

        let cleaned = clean_temporary_files(root, true, &Walker::fanout(2), &log)
            .await
            .unwrap();
        assert_eq!(cleaned.removed, 2);
        assert!(!root.join("scratch.tmp").exists());
        assert!(root.join("keep.txt").exists());
        assert_eq!(log.len(), 2);

        log.undo().unwrap();
        log.undo().unwrap();
        assert!(root.join("scratch.tmp").exists());
        assert!(root.join("logs/run.log").exists());
    }
}
