//! Logging facilities for Umbra.
//!
//! Umbra uses the `tracing` crate for instrumentation. Nothing is printed
//! unless the host installs a subscriber:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("umbra_core=debug,umbra=debug")
//!         .init();
//!
//!     // Create the bridge and subscriptions...
//! }
//! ```
//!
//! Every event is emitted under one of the [`targets`] so the notification
//! thread, the delivery path and each platform adapter can be filtered
//! independently.

/// Span names used throughout Umbra for tracing.
pub mod span_names {
    /// Subscription thread span (one per live subscription).
    pub const SUBSCRIPTION: &str = "umbra::subscription";
    /// Callback delivery span.
    pub const DELIVERY: &str = "umbra::delivery";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "umbra_core";
    /// Subscription lifecycle target.
    pub const SUBSCRIPTION: &str = "umbra_core::subscription";
    /// Callback bridge target.
    pub const BRIDGE: &str = "umbra_core::bridge";
    /// Platform adapter target.
    pub const PLATFORM: &str = "umbra::platform";
    /// Facade target.
    pub const FACADE: &str = "umbra::bridge";
    /// Theme enumeration and classification target.
    pub const THEMES: &str = "umbra::themes";
    /// Host integration target.
    pub const HOST: &str = "umbra::host";
}
