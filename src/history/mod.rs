//! Action Log: the in-memory undo stack for single-file mutations

pub mod entry;
mod log;

pub use entry::{Action, ActionKind};
pub use log::{ActionLog, UndoOutcome};
