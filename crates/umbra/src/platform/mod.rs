//! Platform adapters and backend selection.
//!
//! Each platform contributes a reader (the current preference) and a source
//! factory (a blocking change primitive per subscription):
//!
//! | Backend | Reader | Change primitive |
//! |---|---|---|
//! | Windows registry | `AppsUseLightTheme`, `SPI_GETHIGHCONTRAST` | `RegNotifyChangeKeyValue` + event |
//! | GNOME | GSettings `org.gnome.desktop.interface` | `changed` signals on a private main context |
//! | GTK | `gtk-theme-name` on the toolkit thread | `notify::gtk-theme-name` forwarded over a channel |
//! | XDG portal | `org.freedesktop.appearance` | `SettingChanged` D-Bus signals |
//! | macOS | `AppleInterfaceStyle` | `AppleInterfaceThemeChangedNotification` |
//!
//! On Linux the source is chosen explicitly through
//! [`BridgeConfig::signal_type`](crate::config::BridgeConfig::signal_type):
//!
//! ```
//! use umbra::config::{BridgeConfig, SignalType};
//! use umbra::platform::Backend;
//!
//! let backend = Backend::select(&BridgeConfig::new().with_signal_type(SignalType::Xdg));
//! println!("watching through {}", backend.kind());
//! ```

#[cfg(any(target_os = "windows", target_os = "macos"))]
mod high_contrast;

#[cfg(target_os = "windows")]
mod windows;
#[cfg(target_os = "windows")]
pub use windows::{RegistryBackend, RegistrySource};

#[cfg(all(target_os = "linux", feature = "gnome"))]
mod gnome;
#[cfg(all(target_os = "linux", feature = "gnome"))]
pub use gnome::{GnomeBackend, GnomeSource};

#[cfg(all(target_os = "linux", feature = "gtk"))]
mod gtk;
#[cfg(all(target_os = "linux", feature = "gtk"))]
pub use gtk::{GtkBackend, GtkSource};

#[cfg(all(target_os = "linux", feature = "xdg-portal"))]
mod xdg;
#[cfg(all(target_os = "linux", feature = "xdg-portal"))]
pub use xdg::{PortalBackend, PortalSource};

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
pub use macos::{AppearanceBackend, AppearanceSource};

use std::fmt;

use umbra_core::logging::targets;
use umbra_core::{
    PreferenceReader, PreferenceState, SourceFactory, SourceOpener, unsupported_opener,
};

use crate::config::BridgeConfig;
#[cfg(target_os = "linux")]
use crate::config::SignalType;

/// Which backend a [`Backend`] dispatches to.
///
/// Unlike [`Backend`], every variant exists on every target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Windows registry notifications.
    WindowsRegistry,
    /// GNOME GSettings signals.
    GnomeSignal,
    /// GTK settings property notifications.
    GtkSignal,
    /// XDG desktop portal settings signals.
    XdgPortal,
    /// macOS distributed notification observer.
    MacObserver,
    /// No change source; queries return defaults.
    Unsupported,
}

impl BackendKind {
    /// A short human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::WindowsRegistry => "windows-registry",
            BackendKind::GnomeSignal => "gnome",
            BackendKind::GtkSignal => "gtk",
            BackendKind::XdgPortal => "xdg-portal",
            BackendKind::MacObserver => "macos",
            BackendKind::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The platform adapter in use.
#[derive(Debug, Clone)]
pub enum Backend {
    /// Registry values and notifications.
    #[cfg(target_os = "windows")]
    WindowsRegistry(RegistryBackend),
    /// GSettings values and signals.
    #[cfg(all(target_os = "linux", feature = "gnome"))]
    GnomeSignal(GnomeBackend),
    /// GTK settings on the shared toolkit thread.
    #[cfg(all(target_os = "linux", feature = "gtk"))]
    GtkSignal(GtkBackend),
    /// Desktop portal settings.
    #[cfg(all(target_os = "linux", feature = "xdg-portal"))]
    XdgPortal(PortalBackend),
    /// User defaults and the distributed notification center.
    #[cfg(target_os = "macos")]
    MacObserver(AppearanceBackend),
    /// Reads return [`PreferenceState::fallback`]; subscriptions never fire.
    Unsupported { reason: String },
}

impl Backend {
    /// Select the backend for the current platform and configuration.
    ///
    /// On Linux a signal type whose cargo feature is disabled falls back to
    /// the desktop portal. Without the `xdg-portal` feature it yields
    /// [`Backend::Unsupported`].
    pub fn select(config: &BridgeConfig) -> Self {
        let backend = Self::select_inner(config);
        match &backend {
            Backend::Unsupported { reason } => {
                tracing::warn!(target: targets::PLATFORM, %reason, "no change source available");
            }
            other => {
                tracing::debug!(target: targets::PLATFORM, backend = %other.kind(), "selected backend");
            }
        }
        backend
    }

    #[cfg(target_os = "windows")]
    fn select_inner(_config: &BridgeConfig) -> Self {
        Backend::WindowsRegistry(RegistryBackend)
    }

    #[cfg(target_os = "macos")]
    fn select_inner(_config: &BridgeConfig) -> Self {
        Backend::MacObserver(AppearanceBackend)
    }

    #[cfg(target_os = "linux")]
    fn select_inner(config: &BridgeConfig) -> Self {
        let signal_type = config.signal_type;
        if !signal_type.is_enabled() && SignalType::Xdg.is_enabled() {
            tracing::warn!(
                target: targets::PLATFORM,
                requested = %signal_type,
                "signal type not compiled in, falling back to the desktop portal"
            );
            return Self::linux_backend(config, SignalType::Xdg);
        }
        Self::linux_backend(config, signal_type)
    }

    #[cfg(target_os = "linux")]
    #[cfg_attr(not(any(feature = "gtk", feature = "gnome")), allow(unused_variables))]
    fn linux_backend(config: &BridgeConfig, signal_type: SignalType) -> Self {
        match signal_type {
            #[cfg(feature = "gnome")]
            SignalType::Gnome => Backend::GnomeSignal(GnomeBackend::new(config.gtk.clone())),
            #[cfg(feature = "gtk")]
            SignalType::Gtk => Backend::GtkSignal(GtkBackend::new(
                config.gtk.clone(),
                config.toolkit_ready_timeout(),
            )),
            #[cfg(feature = "xdg-portal")]
            SignalType::Xdg => Backend::XdgPortal(PortalBackend),
            #[allow(unreachable_patterns)]
            disabled => Backend::unsupported(format!(
                "signal type '{disabled}' requires the matching umbra feature"
            )),
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    fn select_inner(_config: &BridgeConfig) -> Self {
        Backend::unsupported(format!("no backend for {}", std::env::consts::OS))
    }

    /// A backend that reports defaults and never fires.
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Backend::Unsupported {
            reason: reason.into(),
        }
    }

    /// Which adapter this is.
    pub fn kind(&self) -> BackendKind {
        match self {
            #[cfg(target_os = "windows")]
            Backend::WindowsRegistry(_) => BackendKind::WindowsRegistry,
            #[cfg(all(target_os = "linux", feature = "gnome"))]
            Backend::GnomeSignal(_) => BackendKind::GnomeSignal,
            #[cfg(all(target_os = "linux", feature = "gtk"))]
            Backend::GtkSignal(_) => BackendKind::GtkSignal,
            #[cfg(all(target_os = "linux", feature = "xdg-portal"))]
            Backend::XdgPortal(_) => BackendKind::XdgPortal,
            #[cfg(target_os = "macos")]
            Backend::MacObserver(_) => BackendKind::MacObserver,
            Backend::Unsupported { .. } => BackendKind::Unsupported,
        }
    }

    /// Returns true if subscriptions on this backend can ever fire.
    pub fn is_supported(&self) -> bool {
        self.kind() != BackendKind::Unsupported
    }
}

impl PreferenceReader for Backend {
    fn read_dark_mode(&self) -> bool {
        match self {
            #[cfg(target_os = "windows")]
            Backend::WindowsRegistry(backend) => backend.read_dark_mode(),
            #[cfg(all(target_os = "linux", feature = "gnome"))]
            Backend::GnomeSignal(backend) => backend.read_dark_mode(),
            #[cfg(all(target_os = "linux", feature = "gtk"))]
            Backend::GtkSignal(backend) => backend.read_dark_mode(),
            #[cfg(all(target_os = "linux", feature = "xdg-portal"))]
            Backend::XdgPortal(backend) => backend.read_dark_mode(),
            #[cfg(target_os = "macos")]
            Backend::MacObserver(backend) => backend.read_dark_mode(),
            Backend::Unsupported { .. } => false,
        }
    }

    fn read_high_contrast(&self) -> bool {
        match self {
            #[cfg(target_os = "windows")]
            Backend::WindowsRegistry(backend) => backend.read_high_contrast(),
            #[cfg(all(target_os = "linux", feature = "gnome"))]
            Backend::GnomeSignal(backend) => backend.read_high_contrast(),
            #[cfg(all(target_os = "linux", feature = "gtk"))]
            Backend::GtkSignal(backend) => backend.read_high_contrast(),
            #[cfg(all(target_os = "linux", feature = "xdg-portal"))]
            Backend::XdgPortal(backend) => backend.read_high_contrast(),
            #[cfg(target_os = "macos")]
            Backend::MacObserver(backend) => backend.read_high_contrast(),
            Backend::Unsupported { .. } => false,
        }
    }

    fn read_state(&self) -> PreferenceState {
        // Linux readers produce both flags from one settings lookup.
        match self {
            #[cfg(target_os = "windows")]
            Backend::WindowsRegistry(backend) => backend.read_state(),
            #[cfg(all(target_os = "linux", feature = "gnome"))]
            Backend::GnomeSignal(backend) => backend.read_state(),
            #[cfg(all(target_os = "linux", feature = "gtk"))]
            Backend::GtkSignal(backend) => backend.read_state(),
            #[cfg(all(target_os = "linux", feature = "xdg-portal"))]
            Backend::XdgPortal(backend) => backend.read_state(),
            #[cfg(target_os = "macos")]
            Backend::MacObserver(backend) => backend.read_state(),
            Backend::Unsupported { .. } => PreferenceState::fallback(),
        }
    }
}

impl SourceFactory for Backend {
    fn open_source(&self) -> SourceOpener {
        match self {
            #[cfg(target_os = "windows")]
            Backend::WindowsRegistry(backend) => backend.opener(),
            #[cfg(all(target_os = "linux", feature = "gnome"))]
            Backend::GnomeSignal(backend) => backend.opener(),
            #[cfg(all(target_os = "linux", feature = "gtk"))]
            Backend::GtkSignal(backend) => backend.opener(),
            #[cfg(all(target_os = "linux", feature = "xdg-portal"))]
            Backend::XdgPortal(backend) => backend.opener(),
            #[cfg(target_os = "macos")]
            Backend::MacObserver(backend) => backend.opener(),
            Backend::Unsupported { reason } => unsupported_opener(reason.clone()),
        }
    }
}

static_assertions::assert_impl_all!(Backend: Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_backend_defaults() {
        let backend = Backend::unsupported("test");
        assert_eq!(backend.kind(), BackendKind::Unsupported);
        assert!(!backend.is_supported());
        assert_eq!(backend.read_state(), PreferenceState::fallback());
        assert!(!backend.read_high_contrast());

        match backend.open_source()() {
            Err(err) => assert!(err.is_unsupported_platform()),
            Ok(_) => panic!("unsupported backend opened a source"),
        }
    }

    #[test]
    fn test_backend_kind_names() {
        assert_eq!(BackendKind::XdgPortal.to_string(), "xdg-portal");
        assert_eq!(BackendKind::Unsupported.name(), "unsupported");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_selection_follows_signal_type() {
        for signal_type in SignalType::ALL {
            let backend = Backend::select(&BridgeConfig::new().with_signal_type(signal_type));
            let expected = match signal_type {
                SignalType::Gnome if cfg!(feature = "gnome") => BackendKind::GnomeSignal,
                SignalType::Gtk if cfg!(feature = "gtk") => BackendKind::GtkSignal,
                _ if cfg!(feature = "xdg-portal") => BackendKind::XdgPortal,
                _ => BackendKind::Unsupported,
            };
            assert_eq!(backend.kind(), expected, "{signal_type}");
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_default_config_selects_a_change_source() {
        let any_source = cfg!(any(feature = "gtk", feature = "gnome", feature = "xdg-portal"));
        let backend = Backend::select(&BridgeConfig::default());
        assert_eq!(backend.is_supported(), any_source);
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn test_windows_selection() {
        assert_eq!(
            Backend::select(&BridgeConfig::new()).kind(),
            BackendKind::WindowsRegistry
        );
    }
}
