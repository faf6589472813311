//! Umbra - cross-platform dark-mode and high-contrast change notifications.
//!
//! This is the main crate: it re-exports `umbra-core` and adds the platform
//! adapters, the [`NotificationBridge`] facade, configuration, GTK theme
//! utilities and the [`ThemeMonitor`].
//!
//! # Example
//!
//! ```no_run
//! use umbra::{BridgeConfig, NotificationBridge};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bridge = NotificationBridge::new(BridgeConfig::from_env()?);
//!     println!("appearance: {}", bridge.query_state());
//!
//!     let handle = bridge.create(|| println!("appearance changed"))?;
//!     std::thread::sleep(std::time::Duration::from_secs(60));
//!     bridge.destroy(handle);
//!     Ok(())
//! }
//! ```

pub use umbra_core::*;

mod bridge;
pub mod config;
mod monitor;
pub mod platform;
pub mod prelude;
pub mod themes;

pub use bridge::{BridgeError, NotificationBridge, SubscriptionHandle};
pub use config::{BridgeConfig, GtkThemeConfig, SignalType};
pub use monitor::{ThemeListener, ThemeMonitor};
pub use platform::{Backend, BackendKind};
