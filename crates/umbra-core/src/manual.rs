//! In-process change source and preference reader driven by hand.
//!
//! Used by tests and by hosts that want to simulate OS preference changes
//! without touching real platform settings.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::{Condvar, Mutex};

use crate::error::Error;
use crate::source::{Canceller, ChangeSource, PreferenceReader, SourceOpener, Wakeup};
use crate::state::PreferenceState;

#[derive(Debug)]
enum Event {
    Change,
    Fail(String),
    Stop,
}

#[derive(Default)]
struct Progress {
    sent: u64,
    consumed: u64,
}

#[derive(Default)]
struct ManualState {
    closed: AtomicBool,
    progress: Mutex<Progress>,
    consumed_changed: Condvar,
}

/// Create a connected trigger and source.
pub fn manual_source() -> (ManualTrigger, ManualSource) {
    let (tx, rx) = unbounded();
    let state = Arc::new(ManualState::default());
    let trigger = ManualTrigger {
        tx: tx.clone(),
        state: Arc::clone(&state),
    };
    let source = ManualSource { tx, rx, state };
    (trigger, source)
}

/// The controlling half of a manual source.
#[derive(Clone)]
pub struct ManualTrigger {
    tx: Sender<Event>,
    state: Arc<ManualState>,
}

impl ManualTrigger {
    /// Simulate one OS preference change.
    pub fn fire(&self) {
        self.send(Event::Change);
    }

    /// Make the next wait fail with the given message.
    pub fn fail(&self, message: impl Into<String>) {
        self.send(Event::Fail(message.into()));
    }

    fn send(&self, event: Event) {
        self.state.progress.lock().sent += 1;
        if self.tx.send(event).is_err() {
            // Receiver dropped together with the source; nothing will consume it.
            self.state.progress.lock().consumed += 1;
            self.state.consumed_changed.notify_all();
        }
    }

    /// Wait until every event fired so far has been taken by the source.
    ///
    /// Returns false if the timeout elapsed first.
    pub fn wait_until_consumed(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut progress = self.state.progress.lock();
        while progress.consumed < progress.sent {
            if self
                .state
                .consumed_changed
                .wait_until(&mut progress, deadline)
                .timed_out()
            {
                return progress.consumed >= progress.sent;
            }
        }
        true
    }

    /// Returns true once the source has been dropped.
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}

/// A [`ChangeSource`] that wakes when its [`ManualTrigger`] fires.
pub struct ManualSource {
    tx: Sender<Event>,
    rx: Receiver<Event>,
    state: Arc<ManualState>,
}

impl ManualSource {
    /// Wrap this source in an opener that hands it to a subscription.
    pub fn into_opener(self) -> SourceOpener {
        Box::new(move || Ok(Box::new(self) as Box<dyn ChangeSource>))
    }

    fn consumed(&self) {
        self.state.progress.lock().consumed += 1;
        self.state.consumed_changed.notify_all();
    }
}

impl ChangeSource for ManualSource {
    fn wait_for_change(&mut self) -> Wakeup {
        match self.rx.recv() {
            Ok(Event::Change) => {
                self.consumed();
                Wakeup::Changed
            }
            Ok(Event::Fail(message)) => {
                self.consumed();
                Wakeup::Failed(Error::wait(message))
            }
            Ok(Event::Stop) | Err(_) => Wakeup::Stopped,
        }
    }

    fn canceller(&self) -> Canceller {
        let tx = self.tx.clone();
        Canceller::new(move || {
            let _ = tx.send(Event::Stop);
        })
    }
}

impl Drop for ManualSource {
    fn drop(&mut self) {
        self.state.closed.store(true, Ordering::SeqCst);
    }
}

/// A [`PreferenceReader`] whose answer is set by hand.
#[derive(Clone, Default)]
pub struct ManualPreferences {
    state: Arc<Mutex<PreferenceState>>,
}

impl ManualPreferences {
    /// Create a reader reporting `state`.
    pub fn new(state: PreferenceState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Change the reported state.
    pub fn set(&self, state: PreferenceState) {
        *self.state.lock() = state;
    }
}

impl PreferenceReader for ManualPreferences {
    fn read_dark_mode(&self) -> bool {
        self.state.lock().dark_mode_enabled
    }

    fn read_high_contrast(&self) -> bool {
        self.state.lock().high_contrast_enabled
    }

    fn read_state(&self) -> PreferenceState {
        *self.state.lock()
    }
}
