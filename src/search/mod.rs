//! Name search on top of the fanout traversal

mod glob;

pub use glob::GlobPattern;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::FsError;
use crate::traversal::{Entry, TraversalMode, Visitor, Walker};

/// Suffixes of files treated as disposable by `clean-tmp`
pub const TEMPORARY_SUFFIXES: [&str; 3] = [".tmp", ".log", ".bak"];

/// Every entry below `root` whose base name matches `pattern`, sorted
pub async fn find(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, FsError> {
    find_with(root, pattern, &Walker::new(TraversalMode::Fanout)).await
}

pub async fn find_with(
    root: &Path,
    pattern: &str,
    walker: &Walker,
) -> Result<Vec<PathBuf>, FsError> {
    let glob = GlobPattern::new(pattern)?;
    let mut matches = collect(root, walker, move |entry| glob.matches(&entry.file_name())).await?;
    matches.sort();

    tracing::debug!(
        root = %root.display(),
        pattern,
        matches = matches.len(),
        "Search finished"
    );
    Ok(matches)
}

/// Files below `root` whose name ends in one of `TEMPORARY_SUFFIXES`, sorted
pub async fn find_temporary_files(root: &Path, walker: &Walker) -> Result<Vec<PathBuf>, FsError> {
    let mut matches = collect(root, walker, |entry| {
        let name = entry.file_name();
        !entry.is_directory && TEMPORARY_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
    })
    .await?;
    matches.sort();
    Ok(matches)
}

async fn collect<F>(root: &Path, walker: &Walker, keep: F) -> Result<Vec<PathBuf>, FsError>
where
    F: Fn(&Entry) -> bool + Send + Sync + 'static,
{
    let found = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&found);
    let visitor: Visitor = Arc::new(move |entry: Entry| {
        if keep(&entry) {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(entry.path);
        }
    });

    walker.walk(root, visitor).await?;

    let paths = std::mem::take(&mut *found.lock().unwrap_or_else(PoisonError::into_inner));
    Ok(paths)
}
