//! Native change sources and preference readers.
//!
//! Each platform adapter provides two things:
//!
//! - a [`PreferenceReader`] answering "what is the preference right now?"
//! - a [`ChangeSource`] that blocks its thread until the preference changes
//!
//! A change source is created on the subscription thread by a
//! [`SourceOpener`] and never leaves it, so sources may hold thread-affine
//! native objects (GLib contexts, run loops, registry notifications). The
//! only piece that crosses threads is the [`Canceller`], which must be able to
//! interrupt a wait that is already blocked.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::state::PreferenceState;

/// Why a call to [`ChangeSource::wait_for_change`] returned.
#[derive(Debug)]
pub enum Wakeup {
    /// The OS reported a preference change.
    Changed,
    /// The canceller interrupted the wait.
    Stopped,
    /// The primitive failed. The subscription ends without retrying.
    Failed(Error),
}

impl Wakeup {
    /// Returns true for [`Wakeup::Changed`].
    pub fn is_changed(&self) -> bool {
        matches!(self, Wakeup::Changed)
    }
}

/// A blocking native change-notification primitive.
pub trait ChangeSource {
    /// Block until the preference changes, the canceller fires, or the
    /// primitive fails.
    fn wait_for_change(&mut self) -> Wakeup;

    /// A handle that forces a pending or future wait to return
    /// [`Wakeup::Stopped`].
    ///
    /// Cancelling before the wait starts must still make the next wait return,
    /// so implementations post to the same primitive they block on instead of
    /// relying on a flag alone.
    fn canceller(&self) -> Canceller;
}

/// Something that can interrupt a blocked [`ChangeSource`].
pub trait Cancel: Send + Sync {
    /// Interrupt the wait. Must be idempotent.
    fn cancel(&self);
}

impl<F> Cancel for F
where
    F: Fn() + Send + Sync,
{
    fn cancel(&self) {
        self()
    }
}

/// Shareable handle to a source's cancellation mechanism.
#[derive(Clone)]
pub struct Canceller {
    inner: Arc<dyn Cancel>,
}

impl Canceller {
    /// Wrap a cancellation mechanism.
    pub fn new(cancel: impl Cancel + 'static) -> Self {
        Self {
            inner: Arc::new(cancel),
        }
    }

    /// A canceller that does nothing, for sources that never block.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Interrupt the source.
    pub fn cancel(&self) {
        self.inner.cancel();
    }
}

impl fmt::Debug for Canceller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canceller").finish_non_exhaustive()
    }
}

/// Opens a change source on the subscription thread.
pub type SourceOpener = Box<dyn FnOnce() -> Result<Box<dyn ChangeSource>> + Send>;

/// Produces a fresh [`SourceOpener`] for every new subscription.
pub trait SourceFactory: Send + Sync {
    /// An opener for one subscription's change source.
    fn open_source(&self) -> SourceOpener;
}

impl<F> SourceFactory for F
where
    F: Fn() -> SourceOpener + Send + Sync,
{
    fn open_source(&self) -> SourceOpener {
        self()
    }
}

/// Synchronous, side-effect free preference query.
///
/// Readers never fail: an unreadable preference is reported as "not enabled".
pub trait PreferenceReader: Send + Sync {
    /// Whether dark mode is enabled.
    fn read_dark_mode(&self) -> bool;

    /// Whether high contrast is enabled.
    fn read_high_contrast(&self) -> bool;

    /// Both flags as one snapshot.
    fn read_state(&self) -> PreferenceState {
        PreferenceState::new(self.read_dark_mode(), self.read_high_contrast())
    }
}

/// A source for platforms without a change primitive: it never fires.
///
/// Opening it fails with [`Error::UnsupportedPlatform`] so the subscription
/// ends immediately and the caller simply never hears from it.
pub fn unsupported_opener(reason: impl Into<String>) -> SourceOpener {
    let reason = reason.into();
    Box::new(move || Err(Error::unsupported_platform(reason)))
}

static_assertions::assert_impl_all!(Canceller: Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedReader(bool, bool);

    impl PreferenceReader for FixedReader {
        fn read_dark_mode(&self) -> bool {
            self.0
        }

        fn read_high_contrast(&self) -> bool {
            self.1
        }
    }

    #[test]
    fn test_reader_default_state() {
        assert_eq!(
            FixedReader(true, false).read_state(),
            PreferenceState::new(true, false)
        );
    }

    #[test]
    fn test_canceller_from_closure() {
        let count = Arc::new(AtomicUsize::new(0));
        let canceller = Canceller::new({
            let count = Arc::clone(&count);
            move || {
                count.fetch_add(1, Ordering::SeqCst);
            }
        });
        let clone = canceller.clone();
        canceller.cancel();
        clone.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        Canceller::noop().cancel();
    }

    #[test]
    fn test_factory_from_closure() {
        let factory = || unsupported_opener("factory");
        assert!(factory.open_source()().is_err());
        assert!(factory.open_source()().is_err());
    }

    #[test]
    fn test_unsupported_opener_fails() {
        let opener = unsupported_opener("test platform");
        match opener() {
            Err(err) => assert!(err.is_unsupported_platform()),
            Ok(_) => panic!("unsupported opener produced a source"),
        }
    }
}
