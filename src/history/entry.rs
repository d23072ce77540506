//! Reversible action records.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Kind of mutation an action reverses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Delete,
    Move,
}

/// The inverse of a mutation that has already been applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// `path` was created; `content` is `None` for a directory
    Create {
        path: PathBuf,
        content: Option<Vec<u8>>,
    },
    /// `path` was deleted; `content` holds the file bytes, `None` for a directory
    Delete {
        path: PathBuf,
        content: Option<Vec<u8>>,
    },
    /// An entry was moved from `source` to `destination`
    Move {
        source: PathBuf,
        destination: PathBuf,
    },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Create { .. } => ActionKind::Create,
            Action::Delete { .. } => ActionKind::Delete,
            Action::Move { .. } => ActionKind::Move,
        }
    }

    /// The path undo will restore or remove
    pub fn target(&self) -> &Path {
        match self {
            Action::Create { path, .. } | Action::Delete { path, .. } => path,
            Action::Move { source, .. } => source,
        }
    }

    /// Get a human-readable description of the action
    pub fn description(&self) -> String {
        match self {
            Action::Create {
                path,
                content: Some(content),
            } => format!("Create file: {} ({} bytes)", path.display(), content.len()),
            Action::Create {
                path,
                content: None,
            } => format!("Create folder: {}", path.display()),
            Action::Delete {
                path,
                content: Some(content),
            } => format!("Delete file: {} ({} bytes)", path.display(), content.len()),
            Action::Delete {
                path,
                content: None,
            } => format!("Delete folder: {}", path.display()),
            Action::Move {
                source,
                destination,
            } => format!("Move: {} → {}", source.display(), destination.display()),
        }
    }
}
