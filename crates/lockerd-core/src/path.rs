//! Lock path validation and normalization.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{LockError, LockResult};

/// A valid path is one or more `[A-Za-z0-9_-]` segments joined by single
/// slashes, with no trailing slash.
static VALID_PATH_EXPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+(?:/[A-Za-z0-9_-]+)*$").expect("invalid lock path regex")
});

/// A validated, normalized lock path.
///
/// Leading slashes are stripped during parsing, so `"//a/b"` and `"a/b"`
/// name the same lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockPath(String);

impl LockPath {
    /// Cleans and validates a raw lock path.
    ///
    /// Returns [`LockError::InvalidPath`] when the cleaned path contains
    /// empty segments, a trailing slash, or characters outside
    /// `[A-Za-z0-9_-]`.
    pub fn parse(raw: &str) -> LockResult<Self> {
        let cleaned = raw.trim_start_matches('/');

        if !VALID_PATH_EXPR.is_match(cleaned) {
            return Err(LockError::InvalidPath(raw.to_string()));
        }

        Ok(Self(cleaned.to_string()))
    }

    /// The normalized path string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
