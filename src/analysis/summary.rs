//! Per-type summary of a directory tree.
//!
//! The `Summary` maps are owned by a single writer task. Visitors running on
//! any number of walk workers only hold a `Recorder`, the sending half of the
//! writer's channel, so the paired count/size maps are never touched from
//! two threads at once.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::classifier::{classify, read_head, UNTYPED};
use crate::error::FsError;
use crate::traversal::{Entry, Visitor, Walker};

/// One classified non-directory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedFile {
    pub path: PathBuf,
    pub size: u64,
    pub type_label: String,
}

/// Count and total size per content type.
///
/// Every label present in the count map has a matching size entry; both are
/// only ever changed together by `record`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    count_by_type: BTreeMap<String, usize>,
    size_by_type: BTreeMap<String, u64>,
    untyped_count: usize,
    untyped_size: u64,
}

/// One row of the rendered summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow<'a> {
    pub label: &'a str,
    pub count: usize,
    pub size: u64,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one file. Commutative: any order of records yields the same summary.
    pub fn record(&mut self, file: &ClassifiedFile) {
        if file.type_label == UNTYPED {
            self.untyped_count += 1;
            self.untyped_size += file.size;
            return;
        }
        *self
            .count_by_type
            .entry(file.type_label.clone())
            .or_insert(0) += 1;
        *self
            .size_by_type
            .entry(file.type_label.clone())
            .or_insert(0) += file.size;
    }

    pub fn count_of(&self, label: &str) -> usize {
        self.count_by_type.get(label).copied().unwrap_or(0)
    }

    pub fn size_of(&self, label: &str) -> u64 {
        self.size_by_type.get(label).copied().unwrap_or(0)
    }

    /// Detected labels in sorted order (excludes untyped)
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.count_by_type.keys().map(String::as_str)
    }

    pub fn untyped_count(&self) -> usize {
        self.untyped_count
    }

    pub fn untyped_size(&self) -> u64 {
        self.untyped_size
    }

    /// Every recorded file, typed or not
    pub fn total_count(&self) -> usize {
        self.count_by_type.values().sum::<usize>() + self.untyped_count
    }

    pub fn total_size(&self) -> u64 {
        self.size_by_type.values().sum::<u64>() + self.untyped_size
    }

    /// Typed rows sorted by label
    pub fn rows(&self) -> Vec<SummaryRow<'_>> {
        self.count_by_type
            .iter()
            .map(|(label, count)| SummaryRow {
                label: label.as_str(),
                count: *count,
                size: self.size_of(label),
            })
            .collect()
    }
}

/// Cloneable sending half handed to visitors
#[derive(Debug, Clone)]
pub struct Recorder {
    tx: mpsc::UnboundedSender<ClassifiedFile>,
}

impl Recorder {
    /// Queue a file for merging. Returns false if the aggregator is gone.
    pub fn record(&self, file: ClassifiedFile) -> bool {
        self.tx.send(file).is_ok()
    }
}

/// Single-writer task owning the `Summary` for one command invocation
pub struct Aggregator {
    recorder: Recorder,
    writer: JoinHandle<Summary>,
}

impl Aggregator {
    /// Start the writer task. Must be called from within a tokio runtime.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<ClassifiedFile>();
        let writer = tokio::spawn(async move {
            let mut summary = Summary::new();
            while let Some(file) = rx.recv().await {
                summary.record(&file);
            }
            summary
        });
        Self {
            recorder: Recorder { tx },
            writer,
        }
    }

    pub fn recorder(&self) -> Recorder {
        self.recorder.clone()
    }

    pub fn record(&self, file: ClassifiedFile) -> bool {
        self.recorder.record(file)
    }

    /// Close the channel and wait for the final summary.
    ///
    /// Resolves once every `Recorder` clone has been dropped, i.e. after the
    /// driving walk has returned and released its visitor.
    pub async fn snapshot(self) -> Result<Summary, FsError> {
        drop(self.recorder);
        self.writer
            .await
            .map_err(|e| FsError::TaskFailed(e.to_string()))
    }
}

/// Summarise `directory` with the default bounded walker
pub async fn summarise(directory: &Path) -> Result<Summary, FsError> {
    summarise_with(directory, &Walker::default()).await
}

/// Classify every non-directory entry under `directory` and merge the results.
///
/// Files whose head cannot be read are reported through the walker's error
/// sink and left out of the summary.
pub async fn summarise_with(directory: &Path, walker: &Walker) -> Result<Summary, FsError> {
    let (summary, errors) = classify_tree(directory, walker).await?;

    tracing::info!(
        directory = %directory.display(),
        files = summary.total_count(),
        types = summary.count_by_type.len(),
        errors,
        "Summarised directory"
    );

    Ok(summary)
}

/// The summary plus every skipped entry: walk failures and unreadable heads
async fn classify_tree(directory: &Path, walker: &Walker) -> Result<(Summary, usize), FsError> {
    let aggregator = Aggregator::spawn();
    let recorder = aggregator.recorder();
    let reporter = walker.reporter();
    let unreadable = Arc::new(AtomicUsize::new(0));
    let visitor_unreadable = Arc::clone(&unreadable);

    let visitor: Visitor = Arc::new(move |entry: Entry| {
        if entry.is_directory {
            return;
        }
        match read_head(&entry.path) {
            Ok(head) => {
                recorder.record(ClassifiedFile {
                    type_label: classify(&head).to_string(),
                    size: entry.size,
                    path: entry.path,
                });
            }
            Err(e) => {
                visitor_unreadable.fetch_add(1, Ordering::Relaxed);
                reporter.report(&FsError::entry_unreadable(&entry.path, e));
            }
        }
    });

    let stats = walker.walk(directory, visitor).await?;
    let summary = aggregator.snapshot().await?;
    Ok((summary, stats.errors + unreadable.load(Ordering::Relaxed)))
}

/// Aligned text table: one row per type plus the untyped row
pub fn render_summary_table(summary: &Summary) -> String {
    const TYPE_HEADER: &str = "File Type";
    const COUNT_HEADER: &str = "File Count";
    const SIZE_HEADER: &str = "Total Size (bytes)";
    const UNTYPED_ROW: &str = "Untyped Files";

    let rows = summary.rows();

    let type_width = rows
        .iter()
        .map(|r| r.label.len())
        .chain([TYPE_HEADER.len(), UNTYPED_ROW.len()])
        .max()
        .unwrap_or(0);
    let count_width = rows
        .iter()
        .map(|r| r.count.to_string().len())
        .chain([COUNT_HEADER.len(), summary.untyped_count.to_string().len()])
        .max()
        .unwrap_or(0);
    let size_width = rows
        .iter()
        .map(|r| r.size.to_string().len())
        .chain([SIZE_HEADER.len(), summary.untyped_size.to_string().len()])
        .max()
        .unwrap_or(0);
    let rule_width = type_width + count_width + size_width + 6;

    let mut out = String::new();
    out.push_str(&"=".repeat(rule_width));
    out.push('\n');
    out.push_str(&format!(
        "{:<type_width$} | {:<count_width$} | {:<size_width$}\n",
        TYPE_HEADER, COUNT_HEADER, SIZE_HEADER
    ));
    out.push_str(&"-".repeat(rule_width));
    out.push('\n');
    for row in &rows {
        out.push_str(&format!(
            "{:<type_width$} | {:<count_width$} | {:<size_width$}\n",
            row.label, row.count, row.size
        ));
    }
    out.push_str(&"-".repeat(rule_width));
    out.push('\n');
    out.push_str(&format!(
        "{:<type_width$} | {:<count_width$} | {:<size_width$}\n",
        UNTYPED_ROW, summary.untyped_count, summary.untyped_size
    ));
    out.push_str(&"=".repeat(rule_width));
    out
}
