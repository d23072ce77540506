//! Bounded worker-pool strategy
//!
//! A single blocking producer walks the tree sequentially and pushes paths
//! into a bounded queue. `workers` long-lived blocking workers share the
//! receiving end, stat each path and call the visitor.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

use super::{walk_entries, Entry, WalkContext};
use crate::error::FsError;

pub(super) async fn walk(ctx: Arc<WalkContext>, root: PathBuf, workers: usize, capacity: usize) {
    let (tx, rx) = mpsc::channel::<PathBuf>(capacity);
    let rx = Arc::new(Mutex::new(rx));

    let producer_ctx = Arc::clone(&ctx);
    let producer = tokio::task::spawn_blocking(move || produce(&producer_ctx, &root, tx));

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let worker_ctx = Arc::clone(&ctx);
        let rx = Arc::clone(&rx);
        handles.push(tokio::task::spawn_blocking(move || {
            consume(worker_id, &worker_ctx, &rx)
        }));
    }
    // Workers hold the only receivers; once they all exit the producer's
    // sends fail and it stops.
    drop(rx);

    for handle in handles {
        if let Err(join_err) = handle.await {
            tracing::warn!(error = %join_err, "Walk worker panicked");
            ctx.report(FsError::TaskFailed(join_err.to_string()));
        }
    }
    if let Err(join_err) = producer.await {
        tracing::warn!(error = %join_err, "Walk producer panicked");
        ctx.report(FsError::TaskFailed(join_err.to_string()));
    }
}

fn produce(ctx: &WalkContext, root: &Path, tx: mpsc::Sender<PathBuf>) {
    let mut queued = 0usize;
    for result in walk_entries(ctx, root) {
        if ctx.is_cancelled() {
            break;
        }
        match result {
            Ok(dir_entry) => {
                if tx.blocking_send(dir_entry.into_path()).is_err() {
                    break;
                }
                queued += 1;
            }
            Err(e) => ctx.report(FsError::from_walkdir(e, root)),
        }
    }
    tracing::trace!(queued, "Producer finished");
}

fn consume(worker_id: usize, ctx: &WalkContext, rx: &Mutex<mpsc::Receiver<PathBuf>>) {
    let mut processed = 0usize;
    loop {
        if ctx.is_cancelled() {
            break;
        }
        let next = rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .blocking_recv();
        let Some(path) = next else {
            break;
        };
        match Entry::stat(&path) {
            Ok(entry) => ctx.visit(entry),
            Err(err) => ctx.report(err),
        }
        processed += 1;
    }
    tracing::trace!(worker_id, processed, "Worker finished");
}
