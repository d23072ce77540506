//! End-to-end checks of the directory-wide operations and the undo log.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fmsh_lib::analysis::{summarise, summarise_with};
use fmsh_lib::error::FsError;
use fmsh_lib::history::{Action, ActionLog, UndoOutcome};
use fmsh_lib::organize::{organize, organize_with, TRAIL_DIR};
use fmsh_lib::search::{find, find_with};
use fmsh_lib::traversal::{ErrorSink, Walker};
use tempfile::TempDir;
use walkdir::WalkDir;

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];
const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00";

/// A few levels deep, mixing detectable and plain files
fn build_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    for (d, sub) in ["alpha", "beta", "gamma"].iter().enumerate() {
        let base = root.join(sub);
        fs::create_dir_all(base.join("inner")).unwrap();
        for i in 0..4 {
            fs::write(base.join(format!("pic{i}.png")), PNG).unwrap();
            fs::write(base.join("inner").join(format!("anim{i}.gif")), GIF).unwrap();
            fs::write(base.join(format!("note{i}.txt")), "x".repeat(d * 10 + i)).unwrap();
        }
    }
    fs::write(root.join("top.pdf"), b"%PDF-1.5\n").unwrap();
    dir
}

fn file_count(root: &Path) -> usize {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| !e.file_type().is_dir())
        .count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn summary_total_equals_number_of_files() {
    let tree = build_tree();

    let summary = summarise(tree.path()).await.unwrap();

    let by_type: usize = summary.labels().map(|l| summary.count_of(l)).sum();
    assert_eq!(summary.total_count(), by_type + summary.untyped_count());
    assert_eq!(summary.total_count(), file_count(tree.path()));
    assert_eq!(summary.count_of("image/png"), 12);
    assert_eq!(summary.count_of("image/gif"), 12);
    assert_eq!(summary.count_of("application/pdf"), 1);
    assert_eq!(summary.untyped_count(), 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn summary_is_stable_across_runs_and_worker_counts() {
    let tree = build_tree();

    let first = summarise_with(tree.path(), &Walker::bounded(1)).await.unwrap();
    let second = summarise_with(tree.path(), &Walker::bounded(8)).await.unwrap();
    let third = summarise_with(tree.path(), &Walker::bounded(8)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second, third);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn find_matches_glob_independent_of_permits() {
    let tree = build_tree();
    let root = tree.path();

    let expected: BTreeSet<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".gif"))
        .map(|e| e.into_path())
        .collect();

    for permits in [1, 2, 16] {
        let found = find_with(root, "*.gif", &Walker::fanout(permits)).await.unwrap();
        assert_eq!(found.into_iter().collect::<BTreeSet<_>>(), expected);
    }

    let everything = find(root, "").await.unwrap();
    let all: BTreeSet<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .map(|e| e.into_path())
        .collect();
    assert_eq!(everything.into_iter().collect::<BTreeSet<_>>(), all);
}

#[test]
fn delete_round_trip_restores_exact_bytes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("restored.bin");
    let content = b"\x00\x01binary\xffdata".to_vec();

    let log = ActionLog::new();
    log.push(Action::Delete {
        path: path.clone(),
        content: Some(content.clone()),
    });

    assert!(matches!(log.undo().unwrap(), UndoOutcome::Undone(_)));
    assert_eq!(fs::read(&path).unwrap(), content);
    assert!(log.is_empty());

    let before = fs::metadata(&path).unwrap().modified().unwrap();
    assert_eq!(log.undo().unwrap(), UndoOutcome::NothingToUndo);
    assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), before);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn organize_two_files_two_directories() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    fs::write(root.join("photo.png"), PNG).unwrap();
    fs::write(root.join("readme"), "plain words").unwrap();

    let result = organize(&root).await.unwrap();

    assert_eq!(result.files_moved, 2);
    assert!(result.errors.is_empty());
    let dirs: BTreeSet<String> = fs::read_dir(&root)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| name != TRAIL_DIR)
        .collect();
    assert_eq!(dirs, BTreeSet::from(["png".to_string(), "unknown".to_string()]));

    // The trail holds exactly one record per moved file and was not organized
    let trail_files: Vec<_> = WalkDir::new(root.join(TRAIL_DIR))
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .collect();
    assert_eq!(trail_files.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_same_type_files_share_one_directory() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    for i in 0..64 {
        fs::write(root.join(format!("frame{i:02}.gif")), GIF).unwrap();
    }

    let result = organize_with(&root, &Walker::bounded(16)).await.unwrap();

    assert_eq!(result.files_moved, 64);
    assert!(result.errors.is_empty());
    assert_eq!(fs::read_dir(root.join("gif")).unwrap().count(), 64);
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unreadable_entry_is_reported_and_skipped() {
    let tree = build_tree();
    let dangling = tree.path().join("alpha/dangling.png");
    std::os::unix::fs::symlink(tree.path().join("does-not-exist"), &dangling).unwrap();

    let errors: Arc<Mutex<Vec<Option<PathBuf>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_errors = Arc::clone(&errors);
    let sink: ErrorSink = Arc::new(move |err: &FsError| {
        sink_errors
            .lock()
            .unwrap()
            .push(err.path().map(Path::to_path_buf));
    });

    let summary = summarise_with(tree.path(), &Walker::bounded(4).with_error_sink(sink))
        .await
        .unwrap();

    // The link is listed by the walk but its target cannot be read
    assert_eq!(*errors.lock().unwrap(), vec![Some(dangling)]);
    assert_eq!(summary.total_count(), file_count(tree.path()) - 1);
}

#[tokio::test]
async fn missing_root_fails_every_command() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent");

    assert!(matches!(
        summarise(&missing).await,
        Err(FsError::RootUnavailable { .. })
    ));
    assert!(matches!(
        find(&missing, "*").await,
        Err(FsError::RootUnavailable { .. })
    ));
    assert!(matches!(
        organize(&missing).await,
        Err(FsError::RootUnavailable { .. })
    ));
}
