//! Session-scoped undo stack.
//!
//! Strict LIFO: `undo` always reverses the most recent action still on the
//! stack. A failed undo is terminal for that action; it is not pushed back.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::entry::Action;
use crate::error::FsError;

/// Result of an `undo` call that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    /// The stack was empty; nothing was touched
    NothingToUndo,
    /// The action was reversed and removed from the stack
    Undone(Action),
}

impl UndoOutcome {
    pub fn message(&self) -> String {
        match self {
            UndoOutcome::NothingToUndo => "Nothing to undo".to_string(),
            UndoOutcome::Undone(action) => format!("Undone: {}", action.description()),
        }
    }
}

#[derive(Debug, Default)]
pub struct ActionLog {
    actions: Mutex<Vec<Action>>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn stack(&self) -> MutexGuard<'_, Vec<Action>> {
        self.actions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, action: Action) {
        tracing::debug!(action = %action.description(), "Recorded action");
        self.stack().push(action);
    }

    pub fn pop(&self) -> Option<Action> {
        self.stack().pop()
    }

    pub fn len(&self) -> usize {
        self.stack().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack().is_empty()
    }

    /// Descriptions of pending actions, most recent first
    pub fn descriptions(&self) -> Vec<String> {
        self.stack().iter().rev().map(Action::description).collect()
    }

    /// Pop the most recent action and reverse it
    pub fn undo(&self) -> Result<UndoOutcome, FsError> {
        let Some(action) = self.pop() else {
            tracing::info!("Nothing to undo");
            return Ok(UndoOutcome::NothingToUndo);
        };

        match revert(&action) {
            Ok(()) => {
                tracing::info!(action = %action.description(), "Undone");
                Ok(UndoOutcome::Undone(action))
            }
            Err(err) => {
                tracing::warn!(action = %action.description(), error = %err, "Undo failed");
                Err(err)
            }
        }
    }
}

fn revert(action: &Action) -> Result<(), FsError> {
    match action {
        Action::Delete {
            path,
            content: Some(content),
        } => restore_file(path, content).map_err(|e| FsError::mutation_failed("restore", path, e)),
        Action::Delete {
            path,
            content: None,
        } => fs::create_dir(path).map_err(|e| FsError::mutation_failed("restore", path, e)),
        Action::Move {
            source,
            destination,
        } => {
            if fs::symlink_metadata(source).is_ok() {
                return Err(FsError::mutation_failed(
                    "move back",
                    source,
                    io::Error::new(io::ErrorKind::AlreadyExists, "original location is occupied"),
                ));
            }
            fs::rename(destination, source)
                .map_err(|e| FsError::mutation_failed("move back", destination, e))
        }
        Action::Create {
            path,
            content: Some(_),
        } => fs::remove_file(path).map_err(|e| FsError::mutation_failed("remove", path, e)),
        Action::Create {
            path,
            content: None,
        } => fs::remove_dir(path).map_err(|e| FsError::mutation_failed("remove", path, e)),
    }
}

/// Recreate a deleted file without clobbering whatever now sits at `path`
fn restore_file(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(content)?;
    file.sync_all()
}
