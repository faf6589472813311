//! Prelude module for Umbra.
//!
//! ```ignore
//! use umbra::prelude::*;
//! ```
//!
//! This provides access to:
//! - The facade (`NotificationBridge`, `SubscriptionHandle`)
//! - Preference snapshots (`PreferenceState`)
//! - Configuration (`BridgeConfig`, `SignalType`)
//! - Monitoring (`ThemeMonitor`)

// ============================================================================
// Facade
// ============================================================================

pub use crate::bridge::{BridgeError, NotificationBridge, SubscriptionHandle};
pub use crate::platform::{Backend, BackendKind};

// ============================================================================
// Preferences and Sources
// ============================================================================

pub use umbra_core::{ChangeSource, HostCallback, PreferenceReader, PreferenceState, SourceFactory};

// ============================================================================
// Configuration
// ============================================================================

pub use crate::config::{BridgeConfig, GtkThemeConfig, SignalType};

// ============================================================================
// Monitoring
// ============================================================================

pub use crate::monitor::{ThemeListener, ThemeMonitor};
