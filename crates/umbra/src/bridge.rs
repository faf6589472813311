//! The notification bridge facade.
//!
//! [`NotificationBridge`] ties a preference reader and a change-source
//! factory together behind three operations: query the current state,
//! create a subscription, destroy it.

use std::fmt;
use std::sync::Arc;

use umbra_core::logging::targets;
use umbra_core::{
    DeliveryStats, HostCallback, PreferenceReader, PreferenceState, SourceFactory, Subscription,
    SubscriptionOptions,
};

use crate::config::BridgeConfig;
use crate::platform::{Backend, BackendKind};
use crate::themes;

/// Errors returned by [`NotificationBridge::create`].
///
/// Native registration failures are not among them: those produce a
/// subscription that never fires.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The host's callback reference could not be obtained.
    #[error("callback reference could not be obtained: {0}")]
    Callback(String),

    /// The subscription thread could not be started.
    #[error(transparent)]
    Subscription(#[from] umbra_core::Error),
}

impl BridgeError {
    /// Create a callback error.
    pub fn callback(message: impl Into<String>) -> Self {
        Self::Callback(message.into())
    }
}

/// A caller-owned subscription created by [`NotificationBridge::create`].
///
/// Pass it to [`NotificationBridge::destroy`] (or drop it) to stop
/// notifications.
#[derive(Debug)]
pub struct SubscriptionHandle {
    subscription: Subscription,
}

impl SubscriptionHandle {
    /// Process-unique identifier.
    pub fn id(&self) -> u64 {
        self.subscription.id()
    }

    /// Returns true while the subscription is waiting for changes.
    ///
    /// A subscription whose native source could not be opened is never
    /// running.
    pub fn is_running(&self) -> bool {
        self.subscription.is_running()
    }

    /// Number of notifications delivered so far.
    pub fn delivered(&self) -> u64 {
        self.subscription.delivered()
    }

    /// Delivered, skipped and failed callback invocations so far.
    pub fn stats(&self) -> DeliveryStats {
        self.subscription.stats()
    }
}

/// Cross-platform theme-change notification bridge.
///
/// # Example
///
/// ```no_run
/// use umbra::{BridgeConfig, NotificationBridge};
///
/// let bridge = NotificationBridge::new(BridgeConfig::default());
/// println!("current appearance: {}", bridge.query_state());
///
/// let handle = bridge.create(|| println!("appearance changed"))?;
/// // ...
/// bridge.destroy(handle);
/// # Ok::<(), umbra::BridgeError>(())
/// ```
#[derive(Clone)]
pub struct NotificationBridge {
    reader: Arc<dyn PreferenceReader>,
    factory: Arc<dyn SourceFactory>,
    kind: Option<BackendKind>,
    config: BridgeConfig,
}

impl NotificationBridge {
    /// Create a bridge on the backend selected by `config`.
    pub fn new(config: BridgeConfig) -> Self {
        let backend = Backend::select(&config);
        Self::from_backend(backend, config)
    }

    /// Create a bridge on an explicit backend.
    pub fn from_backend(backend: Backend, config: BridgeConfig) -> Self {
        let kind = backend.kind();
        let backend = Arc::new(backend);
        Self {
            reader: Arc::clone(&backend) as Arc<dyn PreferenceReader>,
            factory: backend,
            kind: Some(kind),
            config,
        }
    }

    /// Create a bridge on a custom reader and change-source factory.
    pub fn with_source(
        reader: impl PreferenceReader + 'static,
        factory: impl SourceFactory + 'static,
        config: BridgeConfig,
    ) -> Self {
        Self {
            reader: Arc::new(reader),
            factory: Arc::new(factory),
            kind: None,
            config,
        }
    }

    /// The platform backend in use, or `None` for a custom source.
    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.kind
    }

    /// The configuration this bridge was built with.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Read the current preference.
    ///
    /// Always returns; an unreadable preference is reported as light, normal
    /// contrast.
    pub fn query_state(&self) -> PreferenceState {
        let state = self.reader.read_state();
        tracing::trace!(target: targets::FACADE, %state, "queried preference");
        state
    }

    /// Whether dark mode is enabled.
    pub fn is_dark_mode_enabled(&self) -> bool {
        self.reader.read_dark_mode()
    }

    /// Whether high contrast is enabled.
    pub fn is_high_contrast_enabled(&self) -> bool {
        self.reader.read_high_contrast()
    }

    /// Start a subscription invoking `callback` once per preference change.
    ///
    /// Blocks until the native source has been opened (or failed to open).
    #[tracing::instrument(skip_all, target = "umbra::bridge", level = "debug")]
    pub fn create<C>(&self, callback: C) -> Result<SubscriptionHandle, BridgeError>
    where
        C: HostCallback + 'static,
    {
        let options = SubscriptionOptions::default().with_thread_name(&self.config.thread_name);
        let subscription =
            Subscription::spawn(self.factory.open_source(), Box::new(callback), options)?;
        tracing::debug!(
            target: targets::FACADE,
            id = subscription.id(),
            running = subscription.is_running(),
            "subscription handle created"
        );
        Ok(SubscriptionHandle { subscription })
    }

    /// Stop a subscription and wait for its thread to exit.
    pub fn destroy(&self, handle: SubscriptionHandle) {
        let id = handle.id();
        handle.subscription.destroy();
        tracing::debug!(target: targets::FACADE, id, "subscription handle destroyed");
    }

    /// List installed GTK themes (see [`themes::list_installed_themes`]).
    pub fn list_installed_themes(&self) -> Vec<String> {
        themes::list_installed_themes()
    }
}

impl fmt::Debug for NotificationBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBridge")
            .field("backend", &self.kind)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(NotificationBridge: Send, Sync, Clone);
static_assertions::assert_impl_all!(SubscriptionHandle: Send, Sync);
