//! core::commitish
//!
//! The `pool[@branch]` reference accepted by `-use`, `zed use` and the
//! `.zed_head` file.

use std::fmt;
use std::str::FromStr;

use super::CoreError;

/// Branch used when a reference names only a pool.
pub const DEFAULT_BRANCH: &str = "main";

/// A pool and branch within a lake.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Commitish {
    pool: String,
    branch: String,
}

impl Commitish {
    pub fn new(pool: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            pool: pool.into(),
            branch: branch.into(),
        }
    }

    /// Parse `pool` or `pool@branch`. The split is at the last `@`.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let invalid = |reason: &str| CoreError::InvalidCommitish {
            input: input.to_string(),
            reason: reason.to_string(),
        };
        let text = input.trim();
        if text.is_empty() {
            return Err(invalid("empty reference"));
        }
        if text.chars().any(char::is_whitespace) {
            return Err(invalid("whitespace is not allowed"));
        }
        let (pool, branch) = match text.rsplit_once('@') {
            Some((pool, branch)) => (pool, branch),
            None => (text, DEFAULT_BRANCH),
        };
        if pool.is_empty() {
            return Err(invalid("missing pool name"));
        }
        if branch.is_empty() {
            return Err(invalid("missing branch name after '@'"));
        }
        Ok(Self::new(pool, branch))
    }

    pub fn pool(&self) -> &str {
        &self.pool
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// The same pool on another branch.
    pub fn with_branch(&self, branch: impl Into<String>) -> Self {
        Self::new(self.pool.clone(), branch)
    }
}

impl fmt::Display for Commitish {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.pool, self.branch)
    }
}

impl FromStr for Commitish {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
