//! Cancellation for retry and stabilization sleeps.
//!
//! A [`Canceller`] and any number of [`CancelToken`] clones share one
//! channel. Cancelling drops the sender, which wakes every sleeper at once.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Returned when a sleep was interrupted by cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Caller side: aborts every operation holding a matching token
#[derive(Debug, Clone)]
pub struct Canceller {
    flag: Arc<AtomicBool>,
    wake: Arc<Mutex<Option<Sender<()>>>>,
}

impl Canceller {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        // Dropping the sender disconnects all receivers
        if let Ok(mut wake) = self.wake.lock() {
            wake.take();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Operation side: checked between remote calls, waited on during backoff
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    wake: Receiver<()>,
}

/// Create a connected canceller/token pair
pub fn cancellation() -> (Canceller, CancelToken) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let flag = Arc::new(AtomicBool::new(false));
    let canceller = Canceller {
        flag: flag.clone(),
        wake: Arc::new(Mutex::new(Some(tx))),
    };
    (canceller, CancelToken { flag, wake: rx })
}

impl CancelToken {
    /// A token that is never cancelled
    pub fn never() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            wake: crossbeam_channel::never(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Return `Err(Cancelled)` if cancellation was requested
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, returning early if cancelled
    pub fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        self.check()?;
        let start = Instant::now();
        match self.wake.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => self.check(),
            _ => {
                self.check()?;
                // Canceller dropped without cancelling: finish the sleep
                let remaining = duration.saturating_sub(start.elapsed());
                thread::sleep(remaining);
                Ok(())
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::never()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_sleeps_full_duration() {
        let token = CancelToken::never();
        let start = Instant::now();
        assert_eq!(token.sleep(Duration::from_millis(5)), Ok(()));
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_cancel_before_sleep() {
        let (canceller, token) = cancellation();
        canceller.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.sleep(Duration::from_secs(60)), Err(Cancelled));
    }

    #[test]
    fn test_cancel_wakes_sleeper() {
        let (canceller, token) = cancellation();
        let sleeper = thread::spawn(move || {
            let start = Instant::now();
            let result = token.sleep(Duration::from_secs(60));
            (result, start.elapsed())
        });
        thread::sleep(Duration::from_millis(20));
        canceller.cancel();

        let (result, elapsed) = sleeper.join().unwrap();
        assert_eq!(result, Err(Cancelled));
        assert!(elapsed < Duration::from_secs(10));
    }

    #[test]
    fn test_dropped_canceller_does_not_cancel() {
        let (canceller, token) = cancellation();
        drop(canceller);
        assert_eq!(token.sleep(Duration::from_millis(5)), Ok(()));
        assert!(!token.is_cancelled());
    }
}
