//! Directory inspection: counts, sizes, extremes and a category breakdown.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::FsError;
use crate::traversal::{Entry, Visitor, Walker};

/// A file together with the value that made it stand out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotableFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
}

impl NotableFile {
    fn from_entry(entry: &Entry) -> Self {
        Self {
            path: entry.path.clone(),
            size: entry.size,
            modified_at: entry.modified_at,
        }
    }
}

/// Aggregate statistics for a directory tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsStats {
    pub file_count: usize,
    pub dir_count: usize,
    pub total_size: u64,
    pub largest_file: Option<NotableFile>,
    pub most_recent_file: Option<NotableFile>,
    /// File count per MIME top-level category guessed from the extension
    pub extension_breakdown: BTreeMap<String, usize>,
}

impl FsStats {
    /// Merge one entry. Ties go to the smaller path so that the result does
    /// not depend on visit order.
    fn record(&mut self, entry: &Entry) {
        if entry.is_directory {
            self.dir_count += 1;
            return;
        }

        self.file_count += 1;
        self.total_size += entry.size;
        *self
            .extension_breakdown
            .entry(category_of(&entry.path).to_string())
            .or_insert(0) += 1;

        let larger = match &self.largest_file {
            None => true,
            Some(current) => (entry.size, &current.path) > (current.size, &entry.path),
        };
        if larger {
            self.largest_file = Some(NotableFile::from_entry(entry));
        }

        if let Some(modified) = entry.modified_at {
            let newer = match self.most_recent_file.as_ref() {
                None => true,
                Some(current) => match current.modified_at {
                    None => true,
                    Some(current_modified) => {
                        modified > current_modified
                            || (modified == current_modified && entry.path < current.path)
                    }
                },
            };
            if newer {
                self.most_recent_file = Some(NotableFile::from_entry(entry));
            }
        }
    }
}

/// MIME top-level type for a path's extension
fn category_of(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return "none";
    };
    match mime_guess::from_ext(ext).first() {
        Some(mime) => match mime.type_().as_str() {
            "image" => "image",
            "video" => "video",
            "audio" => "audio",
            "text" => "text",
            "font" => "font",
            "application" => "application",
            _ => "other",
        },
        None => "other",
    }
}

pub async fn inspect(directory: &Path) -> Result<FsStats, FsError> {
    inspect_with(directory, &Walker::default()).await
}

/// Collect `FsStats` for everything below `directory`
pub async fn inspect_with(directory: &Path, walker: &Walker) -> Result<FsStats, FsError> {
    let stats = Arc::new(Mutex::new(FsStats::default()));
    let merged = Arc::clone(&stats);
    let visitor: Visitor = Arc::new(move |entry: Entry| {
        merged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(&entry);
    });

    walker.walk(directory, visitor).await?;

    let result = stats.lock().unwrap_or_else(PoisonError::into_inner).clone();
    tracing::info!(
        directory = %directory.display(),
        files = result.file_count,
        dirs = result.dir_count,
        bytes = result.total_size,
        "Inspected directory"
    );
    Ok(result)
}

/// Human-readable byte count
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

pub fn render_stats(directory: &Path, stats: &FsStats) -> String {
    let mut out = format!("Inspection of {}\n", directory.display());
    out.push_str(&format!("  Files:       {}\n", stats.file_count));
    out.push_str(&format!("  Directories: {}\n", stats.dir_count));
    out.push_str(&format!("  Total size:  {}\n", format_size(stats.total_size)));
    if let Some(largest) = &stats.largest_file {
        out.push_str(&format!(
            "  Largest:     {} ({})\n",
            largest.path.display(),
            format_size(largest.size)
        ));
    }
    if let Some(recent) = &stats.most_recent_file {
        let when = recent
            .modified_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        out.push_str(&format!(
            "  Most recent: {} ({when})\n",
            recent.path.display()
        ));
    }
    if !stats.extension_breakdown.is_empty() {
        out.push_str("  By category:\n");
        for (category, count) in &stats.extension_breakdown {
            out.push_str(&format!("    {category:<12} {count}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use std::fs;
    use tempfile::TempDir;

    fn create_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("photos/raw")).unwrap();
        fs::write(dir.path().join("readme.md"), "# hi").unwrap();
        fs::write(dir.path().join("photos/cat.jpg"), vec![0u8; 300]).unwrap();
        fs::write(dir.path().join("photos/raw/dog.png"), vec![0u8; 300]).unwrap();
        fs::write(dir.path().join("Makefile"), "all:").unwrap();
        fs::write(dir.path().join("data.zzqq"), "?").unwrap();

        set_file_mtime(dir.path().join("readme.md"), FileTime::from_unix_time(1_000, 0)).unwrap();
        set_file_mtime(dir.path().join("photos/cat.jpg"), FileTime::from_unix_time(5_000, 0)).unwrap();
        set_file_mtime(dir.path().join("photos/raw/dog.png"), FileTime::from_unix_time(9_000, 0)).unwrap();
        set_file_mtime(dir.path().join("Makefile"), FileTime::from_unix_time(2_000, 0)).unwrap();
        set_file_mtime(dir.path().join("data.zzqq"), FileTime::from_unix_time(3_000, 0)).unwrap();
        dir
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_inspect_counts_and_extremes() {
        let temp_dir = create_test_dir();
        let root = temp_dir.path();

        let stats = inspect(root).await.unwrap();

        assert_eq!(stats.file_count, 5);
        assert_eq!(stats.dir_count, 2);
        assert_eq!(stats.total_size, 4 + 300 + 300 + 4 + 1);
        // Equal sizes: the smaller path wins
        assert_eq!(stats.largest_file.unwrap().path, root.join("photos/cat.jpg"));
        assert_eq!(
            stats.most_recent_file.unwrap().path,
            root.join("photos/raw/dog.png")
        );
    }

    #[tokio::test]
    async fn test_extension_breakdown() {
        let temp_dir = create_test_dir();

        let stats = inspect_with(temp_dir.path(), &Walker::sequential()).await.unwrap();

        assert_eq!(stats.extension_breakdown.get("image"), Some(&2));
        assert_eq!(stats.extension_breakdown.get("text"), Some(&1));
        assert_eq!(stats.extension_breakdown.get("none"), Some(&1));
        assert_eq!(stats.extension_breakdown.get("other"), Some(&1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_inspect_is_independent_of_worker_count() {
        let temp_dir = create_test_dir();

        let one = inspect_with(temp_dir.path(), &Walker::bounded(1)).await.unwrap();
        let many = inspect_with(temp_dir.path(), &Walker::bounded(8)).await.unwrap();

        assert_eq!(one, many);
    }

    #[tokio::test]
    async fn test_inspect_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let stats = inspect(temp_dir.path()).await.unwrap();
        assert_eq!(stats, FsStats::default());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(12), "12 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }
}
