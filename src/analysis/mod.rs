//! Content analysis: type sniffing, the per-type summary and inspection

pub mod classifier;
mod inspect;
mod summary;

pub use classifier::{classify, detect, read_head, FileKind, HEAD_LEN, UNTYPED};
pub use inspect::{format_size, inspect, inspect_with, render_stats, FsStats, NotableFile};
pub use summary::{
    render_summary_table, summarise, summarise_with, Aggregator, ClassifiedFile, Recorder,
    Summary, SummaryRow,
};
