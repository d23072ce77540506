//! Shell surface: single-entry mutations, the command table and handlers

pub mod filesystem;
pub mod registry;
pub mod shell;

pub use filesystem::{
    backup_file, clean_temporary_files, make_dir, move_path, remove_path, CleanReport,
};
pub use registry::{CommandRegistry, Dispatch, Handler};
pub use shell::{default_registry, expand_path, ShellContext};
