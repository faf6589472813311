//! Core systems for Umbra.
//!
//! This crate provides the platform-independent half of the theme-change
//! notification bridge:
//!
//! - **Preference state**: the `{dark mode, high contrast}` snapshot
//! - **Change sources**: the blocking wait/cancel contract every platform
//!   adapter implements
//! - **Subscriptions**: one background thread per subscription with a
//!   deterministic start/stop lifecycle
//! - **Callback bridge**: delivery to the host with failure containment
//! - **Readiness gate**: bounded waits on process-wide native subsystems
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use umbra_core::{manual_source, Subscription, SubscriptionOptions};
//!
//! let (trigger, source) = manual_source();
//! let fired = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&fired);
//!
//! let subscription = Subscription::spawn(
//!     source.into_opener(),
//!     Box::new(move || {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     }),
//!     SubscriptionOptions::default(),
//! )?;
//!
//! trigger.fire();
//! // ...
//! subscription.destroy();
//! # Ok::<(), umbra_core::Error>(())
//! ```

mod bridge;
mod error;
pub mod logging;
mod manual;
mod readiness;
mod source;
mod state;
mod subscription;

pub use bridge::{CallbackBridge, DeliveryOutcome, DeliveryStats, FallibleCallback, HostCallback};
pub use error::{DeliveryError, Error, Result};
pub use manual::{ManualPreferences, ManualSource, ManualTrigger, manual_source};
pub use readiness::ReadinessGate;
pub use source::{
    Cancel, Canceller, ChangeSource, PreferenceReader, SourceFactory, SourceOpener, Wakeup,
    unsupported_opener,
};
pub use state::PreferenceState;
pub use subscription::{
    DEFAULT_THREAD_NAME, Phase, Subscription, SubscriptionOptions, live_threads,
};
