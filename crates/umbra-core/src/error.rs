//! Error types for Umbra.

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while opening or waiting on a native change source.
///
/// None of these reach the caller of a query: readers fall back to their
/// documented default, and subscriptions log the error and stop firing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Registering for native change notification failed.
    #[error("failed to register for change notification: {0}")]
    Registration(String),

    /// Waiting on the native primitive failed.
    #[error("waiting for a preference change failed: {0}")]
    Wait(String),

    /// A process-wide native subsystem could not be initialized.
    #[error("native subsystem initialization failed: {0}")]
    Initialization(String),

    /// No change source exists for this platform or configuration.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// The subscription thread could not be spawned.
    #[error("failed to spawn subscription thread '{name}': {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create a registration error.
    pub fn registration(message: impl Into<String>) -> Self {
        Self::Registration(message.into())
    }

    /// Create a wait error.
    pub fn wait(message: impl Into<String>) -> Self {
        Self::Wait(message.into())
    }

    /// Create an initialization error.
    pub fn initialization(message: impl Into<String>) -> Self {
        Self::Initialization(message.into())
    }

    /// Create an unsupported-platform error.
    pub fn unsupported_platform(message: impl Into<String>) -> Self {
        Self::UnsupportedPlatform(message.into())
    }

    /// Returns true if this error indicates the operation is not supported.
    pub fn is_unsupported_platform(&self) -> bool {
        matches!(self, Self::UnsupportedPlatform(_))
    }
}

/// Failure to deliver one notification to the host callback.
///
/// Delivery failures are contained: the subscription logs them and keeps
/// waiting for the next change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The callback's entry point could not be resolved. The event is skipped.
    #[error("callback entry point could not be resolved: {0}")]
    Unresolved(String),

    /// The callback ran and reported a failure.
    #[error("callback failed: {0}")]
    Failed(String),
}

impl DeliveryError {
    /// Create an unresolved-callback error.
    pub fn unresolved(message: impl Into<String>) -> Self {
        Self::Unresolved(message.into())
    }

    /// Create a callback-failure error.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
