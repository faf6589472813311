//! Delivery of change notifications to the host callback.
//!
//! The subscription thread hands every detected change to a
//! [`CallbackBridge`], which invokes the host's [`HostCallback`] and contains
//! whatever goes wrong: an unresolvable entry point, a reported failure or a
//! Rust panic. None of these end the subscription.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::error::DeliveryError;
use crate::logging::{span_names, targets};

/// The caller-supplied notification target.
///
/// Implementations are moved onto the subscription thread and invoked there,
/// one call at a time. Host runtimes that need per-thread attachment do it
/// inside `invoke` and release it before returning.
pub trait HostCallback: Send {
    /// Notify the host of one change.
    fn invoke(&mut self) -> Result<(), DeliveryError>;
}

impl<F> HostCallback for F
where
    F: FnMut() + Send,
{
    fn invoke(&mut self) -> Result<(), DeliveryError> {
        self();
        Ok(())
    }
}

/// Adapts a closure returning a delivery result into a [`HostCallback`].
pub struct FallibleCallback<F>(pub F);

impl<F> HostCallback for FallibleCallback<F>
where
    F: FnMut() -> Result<(), DeliveryError> + Send,
{
    fn invoke(&mut self) -> Result<(), DeliveryError> {
        (self.0)()
    }
}

/// What happened to one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The callback ran to completion.
    Delivered,
    /// The callback could not be resolved; the event was dropped.
    Skipped,
    /// The callback reported a failure.
    Failed,
    /// The callback panicked.
    Panicked,
}

/// Per-bridge delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Owns the host callback for the lifetime of one subscription.
pub struct CallbackBridge {
    callback: Box<dyn HostCallback>,
    stats: DeliveryStats,
}

impl CallbackBridge {
    /// Wrap a host callback.
    pub fn new(callback: Box<dyn HostCallback>) -> Self {
        Self {
            callback,
            stats: DeliveryStats::default(),
        }
    }

    /// Invoke the callback once, containing any failure.
    pub fn deliver(&mut self) -> DeliveryOutcome {
        let span = tracing::trace_span!(span_names::DELIVERY);
        let _enter = span.enter();

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.callback.invoke()));
        let outcome = match result {
            Ok(Ok(())) => DeliveryOutcome::Delivered,
            Ok(Err(DeliveryError::Unresolved(reason))) => {
                tracing::debug!(target: targets::BRIDGE, %reason, "callback unresolved, skipping event");
                DeliveryOutcome::Skipped
            }
            Ok(Err(DeliveryError::Failed(reason))) => {
                tracing::warn!(target: targets::BRIDGE, %reason, "callback failed");
                DeliveryOutcome::Failed
            }
            Err(payload) => {
                tracing::warn!(
                    target: targets::BRIDGE,
                    panic = panic_message(payload.as_ref()),
                    "callback panicked"
                );
                DeliveryOutcome::Panicked
            }
        };

        match outcome {
            DeliveryOutcome::Delivered => self.stats.delivered += 1,
            DeliveryOutcome::Skipped => self.stats.skipped += 1,
            DeliveryOutcome::Failed | DeliveryOutcome::Panicked => self.stats.failed += 1,
        }
        outcome
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> DeliveryStats {
        self.stats
    }
}

impl fmt::Debug for CallbackBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackBridge")
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
