//! Bounded retry for structural commits.
//!
//! A commit built against a stale hash is rejected with a conflict. The
//! writer then refreshes its reference and rebuilds the commit against the
//! new hash, up to [`MAX_COMMIT_ATTEMPTS`] times. A reference that no longer
//! exists ends the loop at once.

use log::{debug, warn};

use super::error::{CatalogError, CatalogResult};
use crate::storage::VersionStoreError;

/// Attempts made by drop and rename before giving up.
pub const MAX_COMMIT_ATTEMPTS: usize = 5;

/// A conflict means the branch moved under us; refreshing can fix it.
pub fn is_retryable_commit_error(error: &VersionStoreError) -> bool {
    error.is_conflict()
}

/// A missing reference or namespace will not come back by retrying.
pub fn is_terminal_commit_error(error: &VersionStoreError) -> bool {
    error.is_not_found()
}

/// Why a retried commit stopped without succeeding.
#[derive(Debug)]
pub enum CommitAbort {
    /// the store rejected the last attempt
    Store(VersionStoreError),
    /// the catalog failed around the attempt, e.g. while refreshing
    Catalog(CatalogError),
}

impl From<VersionStoreError> for CommitAbort {
    fn from(error: VersionStoreError) -> Self {
        CommitAbort::Store(error)
    }
}

impl From<CatalogError> for CommitAbort {
    fn from(error: CatalogError) -> Self {
        CommitAbort::Catalog(error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
}

impl RetryPolicy {
    /// At least one attempt is always made.
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Run `attempt` until it succeeds, fails for good, or the attempts run
    /// out. `refresh` runs between a conflicting attempt and the next one.
    ///
    /// On exhaustion the conflict of the last attempt is returned.
    pub fn run<T>(
        &self,
        mut attempt: impl FnMut(usize) -> Result<T, CommitAbort>,
        mut refresh: impl FnMut() -> CatalogResult<()>,
    ) -> Result<T, CommitAbort> {
        let mut n = 1;
        loop {
            match attempt(n) {
                Ok(value) => return Ok(value),
                Err(CommitAbort::Store(e)) if is_retryable_commit_error(&e) => {
                    if n >= self.max_attempts {
                        warn!("commit still conflicting after {} attempts: {}", n, e);
                        return Err(CommitAbort::Store(e));
                    }
                    warn!("commit attempt {}/{} conflicted, refreshing: {}", n, self.max_attempts, e);
                    refresh()?;
                    n += 1;
                }
                Err(CommitAbort::Store(e)) if is_terminal_commit_error(&e) => {
                    debug!("commit attempt {} hit a terminal error: {}", n, e);
                    return Err(CommitAbort::Store(e));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_COMMIT_ATTEMPTS)
    }
}
