//! Reorganiser
//!
//! Moves every file below a directory into a subdirectory named after its
//! detected type (`png`, `pdf`, ... or `unknown`) and leaves a trail file per
//! move under `.undo` so the run can be reverted with `undo_organize`.
//!
//! Files are collected first with a bounded walk that skips the trail
//! directory, then processed concurrently. Nothing is moved while the tree is
//! still being walked.

mod trail;

pub use trail::{read_trail, trail_dir, undo_organize, TrailRecord, UndoOrganizeResult};

use dashmap::DashSet;
use futures::stream::{FuturesUnordered, StreamExt};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Semaphore;

use crate::analysis::{detect, read_head};
use crate::error::FsError;
use crate::traversal::{CancelFlag, Entry, Visitor, Walker};

/// Reserved trail directory, never classified or moved
pub const TRAIL_DIR: &str = ".undo";

/// Target directory for content that matches no signature
pub const UNKNOWN_DIR: &str = "unknown";

#[derive(Debug, Default)]
pub struct OrganizeResult {
    pub files_moved: usize,
    /// Files already sitting in their target directory
    pub files_unchanged: usize,
    pub errors: Vec<FsError>,
}

enum Placement {
    Moved,
    Unchanged,
}

/// Organize `directory` with the default bounded walker
pub async fn organize(directory: &Path) -> Result<OrganizeResult, FsError> {
    organize_with(directory, &Walker::default()).await
}

/// Organize `directory`. The walker's concurrency also caps how many files
/// are moved at once; its error sink sees walk-time failures.
pub async fn organize_with(directory: &Path, walker: &Walker) -> Result<OrganizeResult, FsError> {
    let root = directory
        .canonicalize()
        .map_err(|e| FsError::root_unavailable(directory, e))?;

    let files = collect_files(&root, walker).await?;
    tracing::debug!(root = %root.display(), files = files.len(), "Collected files to organize");

    let permits = Arc::new(Semaphore::new(walker.concurrency().max(1)));
    let layout = Arc::new(Layout {
        root,
        ensured: DashSet::new(),
        claimed: DashSet::new(),
    });

    let mut pending: FuturesUnordered<_> = files
        .into_iter()
        .map(|file| {
            organize_one(
                Arc::clone(&layout),
                file,
                Arc::clone(&permits),
                walker.cancel_flag().clone(),
            )
        })
        .collect();

    let mut result = OrganizeResult::default();
    while let Some(outcome) = pending.next().await {
        match outcome {
            Ok(Some(Placement::Moved)) => result.files_moved += 1,
            Ok(Some(Placement::Unchanged)) => result.files_unchanged += 1,
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(error = %err, "Could not organize file");
                result.errors.push(err);
            }
        }
    }

    tracing::info!(
        root = %layout.root.display(),
        moved = result.files_moved,
        unchanged = result.files_unchanged,
        errors = result.errors.len(),
        "Organize finished"
    );
    Ok(result)
}

/// State shared by every move of one run
struct Layout {
    root: PathBuf,
    /// Target directories known to exist
    ensured: DashSet<PathBuf>,
    /// Target paths reserved by a move of this run
    claimed: DashSet<PathBuf>,
}

/// Every non-directory entry below `root`, trail directory excluded
async fn collect_files(root: &Path, walker: &Walker) -> Result<Vec<PathBuf>, FsError> {
    let files = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&files);
    let visitor: Visitor = Arc::new(move |entry: Entry| {
        if !entry.is_directory {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(entry.path);
        }
    });

    walker
        .clone()
        .with_excluded(trail::trail_dir(root))
        .walk(root, visitor)
        .await?;

    let mut files = std::mem::take(&mut *files.lock().unwrap_or_else(PoisonError::into_inner));
    files.sort();
    Ok(files)
}

/// Wait for a permit, then move one file on a blocking thread.
/// `None` means the run was cancelled before this file was touched.
async fn organize_one(
    layout: Arc<Layout>,
    file: PathBuf,
    permits: Arc<Semaphore>,
    cancel: CancelFlag,
) -> Result<Option<Placement>, FsError> {
    let _permit = permits
        .acquire_owned()
        .await
        .map_err(|e| FsError::TaskFailed(e.to_string()))?;
    if cancel.is_cancelled() {
        return Ok(None);
    }

    let placement = tokio::task::spawn_blocking(move || organize_file(&layout, &file))
        .await
        .map_err(|e| FsError::TaskFailed(e.to_string()))??;
    Ok(Some(placement))
}

fn organize_file(layout: &Layout, file: &Path) -> Result<Placement, FsError> {
    let root = layout.root.as_path();
    let head = read_head(file).map_err(|e| FsError::entry_unreadable(file, e))?;
    let label = detect(&head).map_or(UNKNOWN_DIR, |kind| kind.extension);

    let Some(name) = file.file_name() else {
        return Err(FsError::entry_unreadable(
            file,
            io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        ));
    };
    let target_dir = root.join(label);
    let target = target_dir.join(name);
    if target == file {
        return Ok(Placement::Unchanged);
    }

    // rename replaces an existing target, so two same-named files of one
    // type must never both pass the occupancy check
    if !layout.claimed.insert(target.clone()) {
        return Err(target_taken(&target));
    }

    ensure_dir(&target_dir, &layout.ensured)
        .map_err(|e| FsError::mutation_failed("mkdir", &target_dir, e))?;

    if fs::symlink_metadata(&target).is_ok() {
        return Err(target_taken(&target));
    }
    if let Err(e) = fs::rename(file, &target) {
        layout.claimed.remove(&target);
        return Err(FsError::mutation_failed("move", file, e));
    }

    trail::write_record(root, label, name, file)
        .map_err(|e| FsError::mutation_failed("write trail", &target, e))?;

    tracing::debug!(from = %file.display(), to = %target.display(), "Moved file");
    Ok(Placement::Moved)
}

fn target_taken(target: &Path) -> FsError {
    FsError::mutation_failed(
        "move",
        target,
        io::Error::new(io::ErrorKind::AlreadyExists, "target already exists"),
    )
}

/// Create-if-absent, safe when many workers target the same directory
fn ensure_dir(dir: &Path, ensured: &DashSet<PathBuf>) -> io::Result<()> {
    if ensured.contains(dir) {
        return Ok(());
    }
    // create_dir_all treats a directory created concurrently as success
    fs::create_dir_all(dir)?;
    ensured.insert(dir.to_path_buf());
    Ok(())
}
