//! Traversal Engine
//!
//! Walks a directory tree and hands every entry below the root to a visitor.
//! Two concurrent strategies are kept deliberately distinct:
//!
//! - `bounded`: one sequential walk feeds a queue drained by a fixed number
//!   of long-lived blocking workers. Peak concurrency is the worker count no
//!   matter how wide the tree is.
//! - `fanout`: one task per directory, gated by a counting semaphore. The
//!   number of tasks created over a run is proportional to the number of
//!   directories, only the number of *simultaneously active* ones is capped.
//!
//! A concurrency of zero selects a plain sequential walk in either mode.

mod bounded;
mod fanout;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::error::FsError;

/// Default capacity of the bounded-mode path queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default worker count for the bounded strategy
pub const DEFAULT_WORKERS: usize = 4;

/// Read-only snapshot of one filesystem node at visit time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub path: PathBuf,
    pub is_directory: bool,
    /// Size in bytes (0 for directories)
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Entry {
    /// Build an entry from metadata that was read without following symlinks
    pub fn from_metadata(path: PathBuf, metadata: &fs::Metadata) -> Self {
        let is_directory = metadata.is_dir();
        Self {
            path,
            is_directory,
            size: if is_directory { 0 } else { metadata.len() },
            modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
        }
    }

    /// Stat a path (symlinks are not followed)
    pub fn stat(path: &Path) -> Result<Self, FsError> {
        let metadata =
            fs::symlink_metadata(path).map_err(|e| FsError::entry_unreadable(path, e))?;
        Ok(Self::from_metadata(path.to_path_buf(), &metadata))
    }

    /// Final path component as a lossy string
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Which concurrent strategy a walk uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalMode {
    /// Fixed worker pool draining a queue fed by one sequential walk
    #[default]
    Bounded,
    /// One task per directory, active tasks capped by a semaphore
    Fanout,
}

/// Caller-supplied function invoked once per entry, possibly from many threads
pub type Visitor = Arc<dyn Fn(Entry) + Send + Sync>;

/// Receives every per-entry error the walk suppresses
pub type ErrorSink = Arc<dyn Fn(&FsError) + Send + Sync>;

/// Shared abort flag, checked at each visit and each queue receive
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Logs a suppressed error and forwards it to the injected sink, if any
#[derive(Clone, Default)]
pub struct ErrorReporter {
    sink: Option<ErrorSink>,
}

impl ErrorReporter {
    pub fn new(sink: Option<ErrorSink>) -> Self {
        Self { sink }
    }

    pub fn report(&self, err: &FsError) {
        tracing::warn!(error = %err, "Skipping entry");
        if let Some(sink) = &self.sink {
            sink(err);
        }
    }
}

/// Statistics from a walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkStats {
    /// Entries handed to the visitor
    pub entries_visited: usize,
    /// Per-entry errors that were reported and skipped
    pub errors: usize,
    /// Whether the walk stopped early because the cancel flag was raised
    pub cancelled: bool,
}

/// State shared by every worker of one walk
pub(crate) struct WalkContext {
    visitor: Visitor,
    reporter: ErrorReporter,
    cancel: CancelFlag,
    excluded: Vec<PathBuf>,
    visited: AtomicUsize,
    errors: AtomicUsize,
}

impl WalkContext {
    fn new(walker: &Walker, visitor: Visitor) -> Self {
        Self {
            visitor,
            reporter: walker.reporter(),
            cancel: walker.cancel.clone(),
            excluded: walker.excluded.clone(),
            visited: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn is_excluded(&self, path: &Path) -> bool {
        self.excluded.iter().any(|excluded| path.starts_with(excluded))
    }

    pub(crate) fn visit(&self, entry: Entry) {
        if self.is_cancelled() {
            return;
        }
        self.visited.fetch_add(1, Ordering::Relaxed);
        (self.visitor)(entry);
    }

    pub(crate) fn report(&self, err: FsError) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.reporter.report(&err);
    }

    fn stats(&self) -> WalkStats {
        WalkStats {
            entries_visited: self.visited.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            cancelled: self.is_cancelled(),
        }
    }
}

/// Configuration for a traversal
#[derive(Clone)]
pub struct Walker {
    mode: TraversalMode,

    /// Workers (bounded) or semaphore permits (fanout); 0 = sequential
    concurrency: usize,

    /// Capacity of the bounded-mode queue
    queue_capacity: usize,

    cancel: CancelFlag,

    error_sink: Option<ErrorSink>,

    /// Subtrees that are neither visited nor descended
    excluded: Vec<PathBuf>,
}

impl Default for Walker {
    fn default() -> Self {
        Self::bounded(DEFAULT_WORKERS)
    }
}

impl std::fmt::Debug for Walker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("mode", &self.mode)
            .field("concurrency", &self.concurrency)
            .field("queue_capacity", &self.queue_capacity)
            .field("excluded", &self.excluded)
            .field("has_error_sink", &self.error_sink.is_some())
            .finish()
    }
}

impl Walker {
    pub fn new(mode: TraversalMode) -> Self {
        let concurrency = match mode {
            TraversalMode::Bounded => DEFAULT_WORKERS,
            TraversalMode::Fanout => num_cpus::get(),
        };
        Self {
            mode,
            concurrency,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            cancel: CancelFlag::new(),
            error_sink: None,
            excluded: Vec::new(),
        }
    }

    /// Worker-pool strategy with `workers` long-lived workers
    pub fn bounded(workers: usize) -> Self {
        Self::new(TraversalMode::Bounded).with_concurrency(workers)
    }

    /// Per-directory task strategy with `permits` simultaneously active tasks
    pub fn fanout(permits: usize) -> Self {
        Self::new(TraversalMode::Fanout).with_concurrency(permits)
    }

    /// Single-threaded walk
    pub fn sequential() -> Self {
        Self::new(TraversalMode::Bounded).with_concurrency(0)
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_error_sink(mut self, sink: ErrorSink) -> Self {
        self.error_sink = Some(sink);
        self
    }

    /// Skip a subtree entirely (the path itself included)
    pub fn with_excluded(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded.push(path.into());
        self
    }

    pub fn mode(&self) -> TraversalMode {
        self.mode
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Reporter bound to this walker's error sink, for visitors that do
    /// their own I/O and need to surface failures the same way
    pub fn reporter(&self) -> ErrorReporter {
        ErrorReporter::new(self.error_sink.clone())
    }

    /// Walk `root`, invoking `visitor` once per entry below it.
    ///
    /// Blocks until every worker has exited and the queue is drained.
    /// Only a root that cannot be opened fails the walk.
    pub async fn walk(&self, root: &Path, visitor: Visitor) -> Result<WalkStats, FsError> {
        check_root(root)?;

        let ctx = Arc::new(WalkContext::new(self, visitor));
        let root = root.to_path_buf();

        tracing::debug!(
            root = %root.display(),
            mode = ?self.mode,
            concurrency = self.concurrency,
            "Starting walk"
        );

        if self.concurrency == 0 {
            let worker_ctx = Arc::clone(&ctx);
            tokio::task::spawn_blocking(move || walk_sequential(&worker_ctx, &root))
                .await
                .map_err(|e| FsError::TaskFailed(e.to_string()))?;
        } else {
            match self.mode {
                TraversalMode::Bounded => {
                    bounded::walk(Arc::clone(&ctx), root, self.concurrency, self.queue_capacity)
                        .await
                }
                TraversalMode::Fanout => {
                    fanout::walk(Arc::clone(&ctx), root, self.concurrency).await
                }
            }
        }

        let stats = ctx.stats();
        tracing::debug!(
            visited = stats.entries_visited,
            errors = stats.errors,
            cancelled = stats.cancelled,
            "Walk finished"
        );
        Ok(stats)
    }
}

/// Walk `root` with the given strategy; `concurrency == 0` walks sequentially
pub async fn traverse(
    root: &Path,
    visitor: Visitor,
    mode: TraversalMode,
    concurrency: usize,
) -> Result<WalkStats, FsError> {
    Walker::new(mode)
        .with_concurrency(concurrency)
        .walk(root, visitor)
        .await
}

/// The root must be a readable directory
fn check_root(root: &Path) -> Result<(), FsError> {
    let metadata = fs::metadata(root).map_err(|e| FsError::root_unavailable(root, e))?;
    if !metadata.is_dir() {
        return Err(FsError::root_unavailable(
            root,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
        ));
    }
    fs::read_dir(root).map_err(|e| FsError::root_unavailable(root, e))?;
    Ok(())
}

/// Sequential walkdir iterator shared by the sequential strategy and the
/// bounded-mode producer
pub(crate) fn walk_entries<'a>(
    ctx: &'a WalkContext,
    root: &Path,
) -> impl Iterator<Item = walkdir::Result<walkdir::DirEntry>> + 'a {
    WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(move |e| !ctx.is_excluded(e.path()))
}

fn walk_sequential(ctx: &WalkContext, root: &Path) {
    for result in walk_entries(ctx, root) {
        if ctx.is_cancelled() {
            break;
        }
        match result {
            Ok(dir_entry) => match dir_entry.metadata() {
                Ok(metadata) => ctx.visit(Entry::from_metadata(dir_entry.into_path(), &metadata)),
                Err(e) => ctx.report(FsError::from_walkdir(e, root)),
            },
            Err(e) => ctx.report(FsError::from_walkdir(e, root)),
        }
    }
}
