//! Wakeup signals shared between producer threads and the background
//! servers.
//!
//! A `Signal` is a latched condition: `notify` sets a pending flag and wakes
//! every waiter, `wait_timeout` consumes the flag. The latch means a notify
//! that races ahead of the wait is not lost, which the shutdown path relies
//! on (the manager notifies each server once and then joins it).
//!
//! Lock poisoning is surfaced as a resource error rather than a panic: a
//! server that cannot trust its signal must stop, not limp on.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::errors::{LogError, LogResult};

/// A latched condition variable.
#[derive(Debug)]
pub(crate) struct Signal {
    name: &'static str,
    pending: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    pub(crate) fn new(name: &'static str) -> Self {
        Signal {
            name,
            pending: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Latch the condition and wake all waiters.
    pub(crate) fn notify(&self) -> LogResult<()> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| LogError::Resource(format!("{} signal lock poisoned", self.name)))?;
        *pending = true;
        self.cond.notify_all();
        Ok(())
    }

    /// Wait up to `timeout` for the condition.
    ///
    /// Returns `true` if the condition was latched (and consumes the latch),
    /// `false` on timeout. Callers re-check their own predicate either way;
    /// the timeout bounds staleness, it does not carry meaning.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> LogResult<bool> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| LogError::Resource(format!("{} signal lock poisoned", self.name)))?;

        if !*pending {
            let (guard, _timed_out) = self
                .cond
                .wait_timeout(pending, timeout)
                .map_err(|_| LogError::Resource(format!("{} signal lock poisoned", self.name)))?;
            pending = guard;
        }

        let fired = *pending;
        *pending = false;
        Ok(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_notify_before_wait_is_latched() {
        let sig = Signal::new("test");
        sig.notify().unwrap();
        assert!(sig.wait_timeout(Duration::from_millis(0)).unwrap());
        // Latch is consumed.
        assert!(!sig.wait_timeout(Duration::from_millis(1)).unwrap());
    }

    #[test]
    fn test_wait_times_out_without_notify() {
        let sig = Signal::new("test");
        assert!(!sig.wait_timeout(Duration::from_millis(5)).unwrap());
    }

    #[test]
    fn test_notify_wakes_waiter() {
        let sig = Arc::new(Signal::new("test"));
        let waiter = {
            let sig = Arc::clone(&sig);
            thread::spawn(move || sig.wait_timeout(Duration::from_secs(5)).unwrap())
        };
        // The waiter either blocks and is woken, or sees the latch.
        sig.notify().unwrap();
        assert!(waiter.join().unwrap());
    }
}
