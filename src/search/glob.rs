//! Shell-glob matching on base names.
//!
//! Supported syntax: `*`, `?`, bracket classes (`[abc]`, `[a-z]`, negated
//! with `!` or `^`), `{a,b}` alternatives and `\` escapes. Matching is
//! case-sensitive and applies to the whole name. The empty pattern matches
//! every name.

use globset::{GlobBuilder, GlobMatcher};

use crate::error::FsError;

#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    matcher: Option<GlobMatcher>,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, FsError> {
        let matcher = if pattern.is_empty() {
            None
        } else {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .backslash_escape(true)
                .build()
                .map_err(|e| FsError::invalid_pattern(pattern, e.kind().to_string()))?;
            Some(glob.compile_matcher())
        };
        Ok(Self {
            source: pattern.to_string(),
            matcher,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.matcher {
            None => true,
            Some(matcher) => matcher.is_match(name),
        }
    }
}
