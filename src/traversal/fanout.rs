//! Recursive fanout strategy
//!
//! Every directory gets its own task. A task holds a semaphore permit only
//! while it reads its directory and visits the entries, then spawns one task
//! per subdirectory and exits. Completion is tracked by a channel whose
//! senders are owned by the live tasks: when the last task drops its clone
//! the driver's `recv` returns `None`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

use super::{Entry, WalkContext};
use crate::error::FsError;

struct Fanout {
    ctx: Arc<WalkContext>,
    permits: Arc<Semaphore>,
}

pub(super) async fn walk(ctx: Arc<WalkContext>, root: PathBuf, permits: usize) {
    let shared = Arc::new(Fanout {
        ctx,
        permits: Arc::new(Semaphore::new(permits)),
    });

    let (done_tx, mut done_rx) = mpsc::channel::<()>(1);
    spawn_directory(shared, root, done_tx);

    // Nothing is ever sent; this returns once every task dropped its sender
    while done_rx.recv().await.is_some() {}
}

fn spawn_directory(shared: Arc<Fanout>, dir: PathBuf, done: mpsc::Sender<()>) {
    tokio::spawn(async move {
        let Ok(permit) = Arc::clone(&shared.permits).acquire_owned().await else {
            return;
        };
        if shared.ctx.is_cancelled() {
            return;
        }

        let ctx = Arc::clone(&shared.ctx);
        let read_dir = dir.clone();
        let subdirs = tokio::task::spawn_blocking(move || visit_directory(&ctx, &read_dir)).await;
        drop(permit);

        match subdirs {
            Ok(subdirs) => {
                for subdir in subdirs {
                    spawn_directory(Arc::clone(&shared), subdir, done.clone());
                }
            }
            Err(join_err) => {
                tracing::warn!(dir = %dir.display(), error = %join_err, "Directory task panicked");
                shared.ctx.report(FsError::TaskFailed(join_err.to_string()));
            }
        }
    });
}

/// Visit every entry of one directory; returns the subdirectories to descend
pub(super) fn visit_directory(ctx: &WalkContext, dir: &Path) -> Vec<PathBuf> {
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(e) => {
            ctx.report(FsError::entry_unreadable(dir, e));
            return Vec::new();
        }
    };

    let mut subdirs = Vec::new();
    for dir_entry in read_dir {
        if ctx.is_cancelled() {
            break;
        }
        let dir_entry = match dir_entry {
            Ok(dir_entry) => dir_entry,
            Err(e) => {
                ctx.report(FsError::entry_unreadable(dir, e));
                continue;
            }
        };

        let path = dir_entry.path();
        if ctx.is_excluded(&path) {
            continue;
        }
        // DirEntry::metadata does not traverse symlinks
        match dir_entry.metadata() {
            Ok(metadata) => {
                let entry = Entry::from_metadata(path, &metadata);
                if entry.is_directory {
                    subdirs.push(entry.path.clone());
                }
                ctx.visit(entry);
            }
            Err(e) => ctx.report(FsError::entry_unreadable(path, e)),
        }
    }
    subdirs
}
