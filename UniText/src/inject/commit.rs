//! Replacing the live file with a verified candidate

use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use tempfile::TempPath;

use crate::error::{Error, Result};

/// Retry policy for the final rename
#[derive(Debug, Clone, Copy)]
pub struct CommitPolicy {
    pub attempts: u32,
    /// Delay before the second attempt; doubled after each failure
    pub initial_backoff: Duration,
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

/// Rename `candidate` over `target`
///
/// The candidate's handle must already be closed. A rename can fail while
/// another process still holds the target open, so it is retried with a
/// growing delay. When every attempt fails and the target no longer matches
/// `safety_copy`, the safety copy is copied back.
///
/// # Errors
/// Returns [`Error::Commit`] once all attempts are spent.
pub fn commit_replace(candidate: TempPath, target: &Path, safety_copy: &Path, policy: CommitPolicy) -> Result<()> {
    let attempts = policy.attempts.max(1);
    let mut backoff = policy.initial_backoff;
    let mut pending = candidate;
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match pending.persist(target) {
            Ok(()) => {
                if attempt > 1 {
                    tracing::debug!("Replaced {} on attempt {}", target.display(), attempt);
                }
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(
                    "Replacing {} failed (attempt {}/{}): {}",
                    target.display(),
                    attempt,
                    attempts,
                    e.error
                );
                last_error = e.error.to_string();
                pending = e.path;
                if attempt < attempts {
                    thread::sleep(backoff);
                    backoff *= 2;
                }
            }
        }
    }
    drop(pending);

    if !same_contents(target, safety_copy) {
        tracing::error!("Restoring {} from {}", target.display(), safety_copy.display());
        if let Err(e) = fs::copy(safety_copy, target) {
            tracing::error!("Restore of {} failed: {}", target.display(), e);
        }
    }
    Err(Error::Commit {
        path: target.to_path_buf(),
        attempts,
        reason: last_error,
    })
}

fn same_contents(a: &Path, b: &Path) -> bool {
    match (fs::read(a), fs::read(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
