//! Subscription lifecycle: one background thread per subscription.
//!
//! A [`Subscription`] owns a thread that opens a [`ChangeSource`], blocks on
//! it and routes every change through a [`CallbackBridge`]. The lifecycle is
//! a small state machine:
//!
//! ```text
//! Created ──open ok──▶ Running ──destroy──▶ Stopping ──join──▶ Stopped
//!    │                    │
//!    └──open failed───────┴──wait failed / source stopped──────▶ Stopped
//! ```
//!
//! The source is opened on the subscription thread before the loop starts and
//! dropped on that same thread after the loop exits. The callback is released
//! after the source, so no delivery can race with native teardown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::bounded;
use parking_lot::Mutex;

use crate::bridge::{CallbackBridge, DeliveryStats, HostCallback};
use crate::error::{Error, Result};
use crate::logging::{span_names, targets};
use crate::source::{Canceller, ChangeSource, SourceOpener, Wakeup};

/// Default name given to subscription threads.
pub const DEFAULT_THREAD_NAME: &str = "umbra-watch";

static NEXT_ID: AtomicU64 = AtomicU64::new(1);
static LIVE_THREADS: AtomicUsize = AtomicUsize::new(0);

/// Number of subscription threads currently alive in this process.
///
/// A thread counts from the moment it starts until its source and callback
/// have both been released.
pub fn live_threads() -> usize {
    LIVE_THREADS.load(Ordering::SeqCst)
}

/// Lifecycle phase of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// The thread exists and is opening its source.
    Created,
    /// The source is open and the thread is waiting for changes.
    Running,
    /// Destroy has begun; the thread is being unblocked.
    Stopping,
    /// The thread has exited or is about to without touching the callback.
    Stopped,
}

/// Options for spawning a subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionOptions {
    /// Name given to the background thread.
    pub thread_name: String,
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl SubscriptionOptions {
    /// Set the thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

struct Shared {
    id: u64,
    stop: AtomicBool,
    phase: Mutex<Phase>,
    stats: Mutex<DeliveryStats>,
}

impl Shared {
    fn set_phase(&self, phase: Phase) {
        let mut current = self.phase.lock();
        // Stopped is terminal.
        if *current != Phase::Stopped {
            *current = phase;
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// A live subscription to preference changes.
///
/// Dropping a subscription destroys it.
pub struct Subscription {
    shared: Arc<Shared>,
    canceller: Option<Canceller>,
    thread: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl Subscription {
    /// Spawn a subscription thread, open the source on it and start waiting.
    ///
    /// Blocks until the open attempt has completed. A source that fails to
    /// open is logged and yields a subscription that never fires; the only
    /// error returned here is failure to spawn the thread.
    #[tracing::instrument(skip_all, target = "umbra_core::subscription", level = "debug")]
    pub fn spawn(
        opener: SourceOpener,
        callback: Box<dyn HostCallback>,
        options: SubscriptionOptions,
    ) -> Result<Self> {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::new(Shared {
            id,
            stop: AtomicBool::new(false),
            phase: Mutex::new(Phase::Created),
            stats: Mutex::new(DeliveryStats::default()),
        });

        let (opened_tx, opened_rx) = bounded::<Option<Canceller>>(1);
        let thread_shared = Arc::clone(&shared);

        let thread = thread::Builder::new()
            .name(options.thread_name.clone())
            .spawn(move || {
                let _live = LiveThread::enter();
                let span = tracing::debug_span!(span_names::SUBSCRIPTION, id);
                let _enter = span.enter();

                let source = match opener() {
                    Ok(source) => source,
                    Err(err) => {
                        tracing::warn!(
                            target: targets::SUBSCRIPTION,
                            error = %err,
                            "change source could not be opened, subscription will never fire"
                        );
                        thread_shared.set_phase(Phase::Stopped);
                        let _ = opened_tx.send(None);
                        drop(callback);
                        return;
                    }
                };

                thread_shared.set_phase(Phase::Running);
                let _ = opened_tx.send(Some(source.canceller()));
                drop(opened_tx);

                run(source, CallbackBridge::new(callback), &thread_shared);
            })
            .map_err(|source| Error::ThreadSpawn {
                name: options.thread_name.clone(),
                source,
            })?;

        // A dropped sender means the opener panicked; treat it as a failed open.
        let canceller = opened_rx.recv().ok().flatten();
        if canceller.is_none() {
            shared.set_phase(Phase::Stopped);
        }

        let thread_id = thread.thread().id();
        tracing::debug!(
            target: targets::SUBSCRIPTION,
            id,
            running = canceller.is_some(),
            "subscription created"
        );

        Ok(Self {
            shared,
            canceller,
            thread: Some(thread),
            thread_id,
        })
    }

    /// Process-unique identifier of this subscription.
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        *self.shared.phase.lock()
    }

    /// Returns true while the subscription is waiting for changes.
    pub fn is_running(&self) -> bool {
        self.phase() == Phase::Running
    }

    /// Number of notifications delivered to the callback so far.
    pub fn delivered(&self) -> u64 {
        self.stats().delivered
    }

    /// Delivery counters of the callback bridge.
    pub fn stats(&self) -> DeliveryStats {
        *self.shared.stats.lock()
    }

    /// Stop the subscription and wait for its thread to exit.
    ///
    /// After this returns the callback will not be invoked again and the
    /// native resources have been released. When called from the callback
    /// itself the thread is detached instead of joined; it exits as soon as
    /// the callback returns.
    pub fn destroy(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        self.shared.stop.store(true, Ordering::SeqCst);
        self.shared.set_phase(Phase::Stopping);
        if let Some(canceller) = self.canceller.take() {
            canceller.cancel();
        }

        if thread::current().id() == self.thread_id {
            tracing::debug!(
                target: targets::SUBSCRIPTION,
                id = self.shared.id,
                "destroy called from the subscription thread, detaching"
            );
            return;
        }

        if thread.join().is_err() {
            tracing::error!(
                target: targets::SUBSCRIPTION,
                id = self.shared.id,
                "subscription thread panicked"
            );
        }
        *self.shared.phase.lock() = Phase::Stopped;
        tracing::debug!(target: targets::SUBSCRIPTION, id = self.shared.id, "subscription destroyed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.shared.id)
            .field("phase", &self.phase())
            .field("stats", &self.stats())
            .finish()
    }
}

fn run(mut source: Box<dyn ChangeSource>, mut bridge: CallbackBridge, shared: &Shared) {
    loop {
        if shared.stop_requested() {
            break;
        }
        match source.wait_for_change() {
            Wakeup::Changed => {
                if shared.stop_requested() {
                    break;
                }
                bridge.deliver();
                *shared.stats.lock() = bridge.stats();
            }
            Wakeup::Stopped => {
                tracing::trace!(target: targets::SUBSCRIPTION, id = shared.id, "wait cancelled");
                break;
            }
            Wakeup::Failed(err) => {
                tracing::warn!(
                    target: targets::SUBSCRIPTION,
                    id = shared.id,
                    error = %err,
                    "change source failed, subscription stops firing"
                );
                break;
            }
        }
    }

    shared.set_phase(Phase::Stopped);
    let stats = bridge.stats();
    tracing::debug!(
        target: targets::SUBSCRIPTION,
        id = shared.id,
        delivered = stats.delivered,
        skipped = stats.skipped,
        failed = stats.failed,
        "subscription thread exiting"
    );
    // Native resources go first, then the host reference.
    drop(source);
    drop(bridge);
}

struct LiveThread;

impl LiveThread {
    fn enter() -> Self {
        LIVE_THREADS.fetch_add(1, Ordering::SeqCst);
        LiveThread
    }
}

impl Drop for LiveThread {
    fn drop(&mut self) {
        LIVE_THREADS.fetch_sub(1, Ordering::SeqCst);
    }
}

static_assertions::assert_impl_all!(Subscription: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manual::manual_source;
    use crate::source::unsupported_opener;
    use std::time::Duration;

    fn counter() -> (Arc<AtomicUsize>, Box<dyn HostCallback>) {
        let count = Arc::new(AtomicUsize::new(0));
        let callback = {
            let count = Arc::clone(&count);
            move || {
                count.fetch_add(1, Ordering::SeqCst);
            }
        };
        (count, Box::new(callback))
    }

    #[test]
    fn test_options_default_name() {
        assert_eq!(SubscriptionOptions::default().thread_name, DEFAULT_THREAD_NAME);
        assert_eq!(
            SubscriptionOptions::default()
                .with_thread_name("custom")
                .thread_name,
            "custom"
        );
    }

    #[test]
    fn test_open_failure_never_fires() {
        let (count, callback) = counter();
        let subscription = Subscription::spawn(
            unsupported_opener("test"),
            callback,
            SubscriptionOptions::default(),
        )
        .unwrap();

        assert_eq!(subscription.phase(), Phase::Stopped);
        assert!(!subscription.is_running());
        subscription.destroy();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_running_then_destroyed() {
        let (trigger, source) = manual_source();
        let (count, callback) = counter();
        let subscription =
            Subscription::spawn(source.into_opener(), callback, SubscriptionOptions::default())
                .unwrap();
        assert_eq!(subscription.phase(), Phase::Running);

        trigger.fire();
        assert!(trigger.wait_until_consumed(Duration::from_secs(2)));
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while subscription.delivered() < 1 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(subscription.delivered(), 1);

        subscription.destroy();
        assert!(trigger.is_closed());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
