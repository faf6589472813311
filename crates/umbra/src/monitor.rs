//! Change-filtered theme monitoring.
//!
//! [`ThemeMonitor`] turns raw change notifications into `(dark, high
//! contrast)` updates: it re-reads the preference on every notification and
//! only reports states that look different.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use umbra_core::PreferenceState;
use umbra_core::logging::targets;

use crate::bridge::{BridgeError, NotificationBridge, SubscriptionHandle};

/// Receives appearance updates from a [`ThemeMonitor`].
pub trait ThemeListener: Send + Sync {
    /// Called with the new appearance.
    fn theme_changed(&self, state: PreferenceState);
}

impl<F> ThemeListener for F
where
    F: Fn(PreferenceState) + Send + Sync,
{
    fn theme_changed(&self, state: PreferenceState) {
        self(state)
    }
}

struct Shared {
    bridge: NotificationBridge,
    last: Mutex<PreferenceState>,
    listener: Box<dyn ThemeListener>,
}

impl Shared {
    fn on_notification(&self) {
        let current = self.bridge.query_state();
        {
            let mut last = self.last.lock();
            if !current.differs_from(&last) {
                tracing::trace!(target: targets::FACADE, %current, "notification without visible change");
                return;
            }
            *last = current;
        }
        tracing::info!(target: targets::FACADE, state = %current, "theme changed");
        self.listener.theme_changed(current);
    }
}

/// Watches the system appearance and reports visible changes.
///
/// ```no_run
/// use umbra::{BridgeConfig, NotificationBridge, ThemeMonitor};
///
/// let bridge = NotificationBridge::new(BridgeConfig::default());
/// let monitor = ThemeMonitor::new(bridge, |state| println!("now {state}"));
/// monitor.start()?;
/// // ...
/// monitor.stop();
/// # Ok::<(), umbra::BridgeError>(())
/// ```
pub struct ThemeMonitor {
    shared: Arc<Shared>,
    handle: Mutex<Option<SubscriptionHandle>>,
}

impl ThemeMonitor {
    /// Create a stopped monitor reporting to `listener`.
    pub fn new(bridge: NotificationBridge, listener: impl ThemeListener + 'static) -> Self {
        Self {
            shared: Arc::new(Shared {
                bridge,
                last: Mutex::new(PreferenceState::fallback()),
                listener: Box::new(listener),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Read the initial state, subscribe, and report the initial state.
    ///
    /// Does nothing if already running.
    pub fn start(&self) -> Result<(), BridgeError> {
        let initial = {
            let mut handle = self.handle.lock();
            if handle.is_some() {
                return Ok(());
            }

            let initial = self.shared.bridge.query_state();
            *self.shared.last.lock() = initial;

            let shared = Arc::clone(&self.shared);
            *handle = Some(self.shared.bridge.create(move || shared.on_notification())?);
            initial
        };

        tracing::info!(target: targets::FACADE, state = %initial, "started theme monitoring");
        self.shared.listener.theme_changed(initial);
        Ok(())
    }

    /// Re-read the preference and report it even if it did not change.
    pub fn request_update(&self) {
        let current = self.shared.bridge.query_state();
        *self.shared.last.lock() = current;
        self.shared.listener.theme_changed(current);
    }

    /// Destroy the subscription. Does nothing if not running.
    pub fn stop(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            self.shared.bridge.destroy(handle);
            tracing::info!(target: targets::FACADE, "stopped theme monitoring");
        }
    }

    /// Start or stop monitoring.
    pub fn set_running(&self, running: bool) -> Result<(), BridgeError> {
        if running {
            self.start()
        } else {
            self.stop();
            Ok(())
        }
    }

    /// Returns true while subscribed.
    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// The last reported appearance.
    pub fn state(&self) -> PreferenceState {
        *self.shared.last.lock()
    }
}

impl Drop for ThemeMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for ThemeMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThemeMonitor")
            .field("running", &self.is_running())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(ThemeMonitor: Send, Sync);
