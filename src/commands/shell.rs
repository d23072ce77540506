//! Shell command handlers
//!
//! Handlers are synchronous. Directory-wide work is driven to completion on
//! the shared runtime through `ShellContext::block_on`.

use std::future::Future;
use std::path::PathBuf;

use tokio::runtime::Handle;

use super::filesystem::{backup_file, clean_temporary_files, make_dir, move_path, remove_path};
use super::registry::CommandRegistry;
use crate::analysis::{inspect_with, render_stats, render_summary_table, summarise_with};
use crate::config::ShellConfig;
use crate::history::ActionLog;
use crate::organize::{organize_with, undo_organize};
use crate::search::find_with;

/// Everything a handler may touch
pub struct ShellContext {
    pub config: ShellConfig,
    runtime: Handle,
    pub action_log: ActionLog,
}

impl ShellContext {
    pub fn new(config: ShellConfig, runtime: Handle, action_log: ActionLog) -> Self {
        Self {
            config,
            runtime,
            action_log,
        }
    }

    /// Run a future to completion. Must not be called from a runtime thread.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// Registry with every built-in command
pub fn default_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    registry.register(
        "summarise",
        "summarise <dir> [--json]",
        "Count and size files per detected content type",
        summarise_command,
    );
    registry.register(
        "inspect",
        "inspect [dir] [--json]",
        "File and directory totals, largest and newest file",
        inspect_command,
    );
    registry.register(
        "find",
        "find <dir> [pattern]",
        "List entries whose name matches a glob pattern",
        find_command,
    );
    registry.register(
        "organize",
        "organize <dir>",
        "Move files into folders named after their type",
        organize_command,
    );
    registry.register(
        "undo-organize",
        "undo-organize <dir>",
        "Move organized files back to where they were",
        undo_organize_command,
    );
    registry.register("rm", "rm <path>", "Remove a file or empty directory", rm_command);
    registry.register("mkdir", "mkdir <path>", "Create a directory", mkdir_command);
    registry.register("mv", "mv <src> <dst>", "Move or rename an entry", mv_command);
    registry.register("backup", "backup <file>", "Rename a file to a timestamped backup", backup_command);
    registry.register(
        "clean-tmp",
        "clean-tmp [dir] [--delete]",
        "List (or delete) .tmp, .log and .bak files",
        clean_tmp_command,
    );
    registry.register("undo", "undo", "Reverse the most recent change", undo_command);
    registry.register("actions", "actions", "List changes that can be undone", actions_command);
    registry
}

/// Expand a leading `~` to the home directory
pub fn expand_path(arg: &str) -> PathBuf {
    if arg == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = arg.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(arg)
}

/// Split `--flags` from positional arguments
fn split_flags(args: &[String]) -> (Vec<&str>, Vec<&str>) {
    args.iter()
        .map(String::as_str)
        .partition(|arg| !arg.starts_with("--"))
}

fn required<'a>(positional: &[&'a str], index: usize, usage: &str) -> Result<&'a str, String> {
    positional
        .get(index)
        .copied()
        .ok_or_else(|| format!("usage: {usage}"))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Failed to serialize: {e}"))
}

fn summarise_command(ctx: &ShellContext, args: &[String]) -> Result<String, String> {
    let (positional, flags) = split_flags(args);
    let dir = expand_path(required(&positional, 0, "summarise <dir> [--json]")?);
    let summary = ctx.block_on(summarise_with(&dir, &ctx.config.bounded_walker()))?;

    if flags.contains(&"--json") {
        to_json(&summary)
    } else {
        Ok(render_summary_table(&summary))
    }
}

fn inspect_command(ctx: &ShellContext, args: &[String]) -> Result<String, String> {
    let (positional, flags) = split_flags(args);
    let dir = expand_path(positional.first().copied().unwrap_or("."));
    let stats = ctx.block_on(inspect_with(&dir, &ctx.config.bounded_walker()))?;

    if flags.contains(&"--json") {
        to_json(&stats)
    } else {
        Ok(render_stats(&dir, &stats))
    }
}

fn find_command(ctx: &ShellContext, args: &[String]) -> Result<String, String> {
    let (positional, _) = split_flags(args);
    let dir = expand_path(required(&positional, 0, "find <dir> [pattern]")?);
    let pattern = positional.get(1).copied().unwrap_or("");
    let found = ctx.block_on(find_with(&dir, pattern, &ctx.config.fanout_walker()))?;

    if found.is_empty() {
        return Ok("No matches".to_string());
    }
    Ok(found
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join("\n"))
}

fn organize_command(ctx: &ShellContext, args: &[String]) -> Result<String, String> {
    let dir = expand_path(required(&split_flags(args).0, 0, "organize <dir>")?);
    let result = ctx.block_on(organize_with(&dir, &ctx.config.bounded_walker()))?;

    let mut out = format!(
        "Moved {} files ({} already in place)",
        result.files_moved, result.files_unchanged
    );
    if !result.errors.is_empty() {
        out.push_str(&format!("\n{} errors:", result.errors.len()));
        for err in &result.errors {
            out.push_str(&format!("\n  {err}"));
        }
    }
    Ok(out)
}

fn undo_organize_command(ctx: &ShellContext, args: &[String]) -> Result<String, String> {
    let dir = expand_path(required(&split_flags(args).0, 0, "undo-organize <dir>")?);
    let result = ctx.block_on(undo_organize(&dir))?;

    let mut out = format!("Restored {} files", result.files_restored);
    for err in &result.errors {
        out.push_str(&format!("\n  {err}"));
    }
    Ok(out)
}

fn rm_command(ctx: &ShellContext, args: &[String]) -> Result<String, String> {
    let path = expand_path(required(&split_flags(args).0, 0, "rm <path>")?);
    remove_path(&path, &ctx.action_log)?;
    Ok(format!("Removed {}", path.display()))
}

fn mkdir_command(ctx: &ShellContext, args: &[String]) -> Result<String, String> {
    let path = expand_path(required(&split_flags(args).0, 0, "mkdir <path>")?);
    make_dir(&path, &ctx.action_log)?;
    Ok(format!("Created {}", path.display()))
}

fn mv_command(ctx: &ShellContext, args: &[String]) -> Result<String, String> {
    let (positional, _) = split_flags(args);
    let source = expand_path(required(&positional, 0, "mv <src> <dst>")?);
    let destination = expand_path(required(&positional, 1, "mv <src> <dst>")?);
    move_path(&source, &destination, &ctx.action_log)?;
    Ok(format!("Moved {} → {}", source.display(), destination.display()))
}

fn backup_command(ctx: &ShellContext, args: &[String]) -> Result<String, String> {
    let path = expand_path(required(&split_flags(args).0, 0, "backup <file>")?);
    let backup = backup_file(&path, &ctx.action_log)?;
    Ok(format!("Backed up to {}", backup.display()))
}

fn clean_tmp_command(ctx: &ShellContext, args: &[String]) -> Result<String, String> {
    let (positional, flags) = split_flags(args);
    let dir = expand_path(positional.first().copied().unwrap_or("."));
    let delete = flags.contains(&"--delete");
    let report = ctx.block_on(clean_temporary_files(
        &dir,
        delete,
        &ctx.config.fanout_walker(),
        &ctx.action_log,
    ))?;

    if report.found.is_empty() {
        return Ok("No temporary files found".to_string());
    }
    let mut out = report
        .found
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join("\n");
    if delete {
        out.push_str(&format!("\nRemoved {} of {}", report.removed, report.found.len()));
        for err in &report.errors {
            out.push_str(&format!("\n  {err}"));
        }
    } else {
        out.push_str("\nRun with --delete to remove them");
    }
    Ok(out)
}

fn undo_command(ctx: &ShellContext, _args: &[String]) -> Result<String, String> {
    let outcome = ctx.action_log.undo()?;
    Ok(outcome.message())
}

fn actions_command(ctx: &ShellContext, _args: &[String]) -> Result<String, String> {
    let descriptions = ctx.action_log.descriptions();
    if descriptions.is_empty() {
        return Ok("Nothing to undo".to_string());
    }
    Ok(descriptions
        .iter()
        .enumerate()
        .map(|(i, d)| format!("{:>3}. {d}", i + 1))
        .collect::<Vec<_>>()
        .join("\n"))
}
