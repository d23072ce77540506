//! Environment-driven configuration.
//!
//! Values come from the process environment after `dotenvy` has loaded an
//! optional `.env` file. Invalid or zero counts fall back to the defaults and
//! are kept in `rejected` so they can be reported once logging is up.

use crate::traversal::{TraversalMode, Walker, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};

pub const WORKERS_VAR: &str = "FMSH_WORKERS";
pub const FANOUT_PERMITS_VAR: &str = "FMSH_FANOUT_PERMITS";
pub const QUEUE_CAPACITY_VAR: &str = "FMSH_QUEUE_CAPACITY";
pub const LOG_VAR: &str = "FMSH_LOG";

/// Tracing filter used when neither `RUST_LOG` nor `FMSH_LOG` is set
pub const DEFAULT_LOG_FILTER: &str = "warn,fmsh_lib=info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// Bounded-pool workers for summarise, inspect and organize
    pub workers: usize,
    /// Semaphore size for fanout search
    pub fanout_permits: usize,
    pub queue_capacity: usize,
    pub log_filter: String,
    /// Variables whose value was ignored, with the raw value
    pub rejected: Vec<(&'static str, String)>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            fanout_permits: num_cpus::get(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            rejected: Vec::new(),
        }
    }
}

impl ShellConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map instead of the
    /// real environment)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mut rejected = Vec::new();
        let mut count = |name: &'static str, default: usize| {
            parse_count(name, lookup(name), default, &mut rejected)
        };
        let workers = count(WORKERS_VAR, defaults.workers);
        let fanout_permits = count(FANOUT_PERMITS_VAR, defaults.fanout_permits);
        let queue_capacity = count(QUEUE_CAPACITY_VAR, defaults.queue_capacity);
        Self {
            workers,
            fanout_permits,
            queue_capacity,
            log_filter: lookup(LOG_VAR)
                .filter(|filter| !filter.trim().is_empty())
                .unwrap_or(defaults.log_filter),
            rejected,
        }
    }

    /// Warn about every ignored variable. Call after the subscriber is set.
    pub fn report_rejected(&self) {
        for (var, value) in &self.rejected {
            tracing::warn!(var, value = %value, "Ignoring invalid count");
        }
    }

    /// Walker for summarise, inspect and organize
    pub fn bounded_walker(&self) -> Walker {
        Walker::bounded(self.workers).with_queue_capacity(self.queue_capacity)
    }

    /// Walker for search
    pub fn fanout_walker(&self) -> Walker {
        Walker::new(TraversalMode::Fanout).with_concurrency(self.fanout_permits)
    }
}

fn parse_count(
    name: &'static str,
    raw: Option<String>,
    default: usize,
    rejected: &mut Vec<(&'static str, String)>,
) -> usize {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => value,
        _ => {
            rejected.push((name, raw));
            default
        }
    }
}
