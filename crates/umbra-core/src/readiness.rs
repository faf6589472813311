//! A one-shot readiness gate with a bounded wait.
//!
//! Process-wide native subsystems that start on their own thread publish
//! their outcome here. Callers wait for it with a timeout instead of blocking
//! forever on a subsystem that may never come up.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Readiness {
    Pending,
    Ready,
    Failed(String),
}

/// Condition-variable guarded "subsystem ready" predicate.
#[derive(Debug)]
pub struct ReadinessGate {
    name: &'static str,
    state: Mutex<Readiness>,
    changed: Condvar,
}

impl ReadinessGate {
    /// Create a pending gate for the named subsystem.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(Readiness::Pending),
            changed: Condvar::new(),
        }
    }

    /// Publish successful initialization. Later outcomes are ignored.
    pub fn mark_ready(&self) {
        self.settle(Readiness::Ready);
    }

    /// Publish failed initialization. Later outcomes are ignored.
    pub fn mark_failed(&self, reason: impl Into<String>) {
        self.settle(Readiness::Failed(reason.into()));
    }

    fn settle(&self, outcome: Readiness) {
        let mut state = self.state.lock();
        if *state == Readiness::Pending {
            *state = outcome;
            self.changed.notify_all();
        }
    }

    /// Returns true once the subsystem reported success.
    pub fn is_ready(&self) -> bool {
        *self.state.lock() == Readiness::Ready
    }

    /// Wait up to `timeout` for the subsystem to settle.
    ///
    /// Returns [`Error::Initialization`] if it failed or did not settle in
    /// time.
    pub fn wait(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            match &*state {
                Readiness::Ready => return Ok(()),
                Readiness::Failed(reason) => {
                    return Err(Error::initialization(format!("{}: {reason}", self.name)));
                }
                Readiness::Pending => {
                    if Instant::now() >= deadline {
                        return Err(Error::initialization(format!(
                            "{} not ready after {timeout:?}",
                            self.name
                        )));
                    }
                    self.changed.wait_until(&mut state, deadline);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wait_times_out() {
        let gate = ReadinessGate::new("toolkit");
        let started = Instant::now();
        let err = gate.wait(Duration::from_millis(50)).unwrap_err();
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(err.to_string().contains("toolkit not ready"));
    }

    #[test]
    fn test_ready_from_another_thread() {
        let gate = Arc::new(ReadinessGate::new("toolkit"));
        let publisher = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                gate.mark_ready();
            })
        };
        gate.wait(Duration::from_secs(2)).unwrap();
        assert!(gate.is_ready());
        publisher.join().unwrap();
    }

    #[test]
    fn test_first_outcome_wins() {
        let gate = ReadinessGate::new("toolkit");
        gate.mark_failed("no display");
        gate.mark_ready();
        let err = gate.wait(Duration::from_millis(10)).unwrap_err();
        assert!(err.to_string().contains("no display"));
        assert!(!gate.is_ready());
    }
}
