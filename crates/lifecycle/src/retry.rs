//! Retry logic with exponential backoff for transient errors.

use crate::cancel::CancelToken;
use crate::config::RetryPolicy;
use crate::error::{Error, ErrorKind, Result};
use std::time::Instant;

/// Execute an operation with retry logic.
///
/// The operation receives the 0-indexed attempt number. It is retried while
/// it fails with a remote error whose kind satisfies `retry_on`, up to
/// `policy.max_attempts` attempts and within `policy.max_elapsed`. Backoff
/// sleeps wait on `cancel`.
///
/// # Returns
/// The result of the operation, [`Error::RetriesExhausted`] when the budget
/// runs out, [`Error::Cancelled`] when cancelled, or the first
/// non-retryable error unchanged.
pub fn with_retry<T, F, P>(
    policy: &RetryPolicy,
    cancel: &CancelToken,
    retry_on: P,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Result<T>,
    P: Fn(ErrorKind) -> bool,
{
    let started = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let err = match operation(attempt) {
            Ok(result) => return Ok(result),
            Err(Error::Remote(e)) if retry_on(e.kind()) => e,
            Err(e) => return Err(e),
        };

        attempt += 1;
        if attempt >= max_attempts {
            return Err(Error::RetriesExhausted {
                attempts: attempt,
                last: err,
            });
        }

        let delay = policy.jittered_delay(attempt - 1);
        if let Some(budget) = policy.max_elapsed
            && started.elapsed() + delay > budget
        {
            log::debug!("Retry budget of {budget:?} exhausted after {attempt} attempts");
            return Err(Error::RetriesExhausted {
                attempts: attempt,
                last: err,
            });
        }

        log::debug!(
            "Attempt {}/{} failed: {}. Retrying in {:?}",
            attempt,
            max_attempts,
            err,
            delay
        );
        cancel.sleep(delay).map_err(|_| Error::Cancelled)?;
    }
}

/// Retry only [`ErrorKind::Transient`] failures.
pub fn transient(kind: ErrorKind) -> bool {
    kind.is_retryable()
}

/// Retry transient failures and concurrent-modification conflicts.
pub fn transient_or_conflict(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Transient | ErrorKind::Conflict)
}
