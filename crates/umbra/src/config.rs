//! Bridge configuration.
//!
//! Configuration can come from a TOML document, from environment variables
//! or be built in code:
//!
//! ```
//! use std::time::Duration;
//! use umbra::config::{BridgeConfig, SignalType};
//!
//! let config = BridgeConfig::from_toml_str(r#"
//!     signal_type = "gnome"
//!     toolkit_ready_timeout_ms = 1500
//!
//!     [gtk]
//!     guess_light_and_dark = false
//!     dark_theme = "Yaru-dark"
//! "#)?;
//!
//! assert_eq!(config.signal_type, SignalType::Gnome);
//! assert_eq!(config.toolkit_ready_timeout(), Duration::from_millis(1500));
//! assert_eq!(config.gtk.dark_theme, "Yaru-dark");
//! assert_eq!(config.gtk.light_theme, "Adwaita");
//! # Ok::<(), umbra::config::ConfigError>(())
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use umbra_core::DEFAULT_THREAD_NAME;

/// Environment variable selecting the Linux signal source.
pub const ENV_SIGNAL_TYPE: &str = "UMBRA_SIGNAL_TYPE";
/// Environment variable overriding the toolkit readiness timeout, in milliseconds.
pub const ENV_TOOLKIT_TIMEOUT_MS: &str = "UMBRA_TOOLKIT_TIMEOUT_MS";

/// Default bound on waiting for the GTK toolkit thread to come up.
pub const DEFAULT_TOOLKIT_READY_TIMEOUT: Duration = Duration::from_secs(3);

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration document is not valid TOML for this schema.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be written as TOML.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range or not recognized.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    /// Create an invalid-value error.
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Which native mechanism reports preference changes on Linux.
///
/// This is always chosen explicitly; it is never detected from the desktop
/// environment. The default is the first of GTK, XDG portal and GNOME whose
/// cargo feature is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    /// GTK settings property notifications (xsettings).
    Gtk,
    /// GSettings change signals for `org.gnome.desktop.interface`.
    Gnome,
    /// The XDG desktop portal `org.freedesktop.appearance` namespace.
    Xdg,
}

impl SignalType {
    /// All signal types, in host index order.
    pub const ALL: [SignalType; 3] = [SignalType::Gtk, SignalType::Gnome, SignalType::Xdg];

    /// Map a host-side integer selector (`0` GTK, `1` GNOME, `2` XDG).
    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    /// Returns true if the cargo feature backing this source is enabled.
    pub fn is_enabled(&self) -> bool {
        match self {
            SignalType::Gtk => cfg!(feature = "gtk"),
            SignalType::Gnome => cfg!(feature = "gnome"),
            SignalType::Xdg => cfg!(feature = "xdg-portal"),
        }
    }

    /// The lowercase name used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Gtk => "gtk",
            SignalType::Gnome => "gnome",
            SignalType::Xdg => "xdg",
        }
    }
}

impl Default for SignalType {
    fn default() -> Self {
        [SignalType::Gtk, SignalType::Xdg, SignalType::Gnome]
            .into_iter()
            .find(SignalType::is_enabled)
            .unwrap_or(SignalType::Gtk)
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalType {
    type Err = ConfigError;

    fn from_str(value: &str) -> ConfigResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gtk" | "xsettings" => Ok(SignalType::Gtk),
            "gnome" | "gsettings" => Ok(SignalType::Gnome),
            "xdg" | "portal" | "xdg-desktop" => Ok(SignalType::Xdg),
            other => Err(ConfigError::invalid_value(
                "signal_type",
                format!("unknown signal type '{other}'"),
            )),
        }
    }
}

/// How GTK theme names are classified as dark or high contrast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GtkThemeConfig {
    /// Derive dark mode from the current theme's guessed night variant
    /// instead of comparing against the configured names.
    pub guess_light_and_dark: bool,
    /// Theme considered light in explicit mode.
    pub light_theme: String,
    /// Theme considered dark in explicit mode.
    pub dark_theme: String,
    /// Theme considered high contrast in explicit mode.
    pub high_contrast_theme: String,
}

impl Default for GtkThemeConfig {
    fn default() -> Self {
        Self {
            guess_light_and_dark: true,
            light_theme: "Adwaita".to_string(),
            dark_theme: "Adwaita-dark".to_string(),
            high_contrast_theme: "HighContrast".to_string(),
        }
    }
}

/// Configuration for a [`NotificationBridge`](crate::NotificationBridge).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Linux change source. Ignored on other platforms.
    pub signal_type: SignalType,
    /// Bound on waiting for the GTK toolkit thread, in milliseconds.
    pub toolkit_ready_timeout_ms: u64,
    /// Name given to subscription threads.
    pub thread_name: String,
    /// GTK theme classification.
    pub gtk: GtkThemeConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            signal_type: SignalType::default(),
            toolkit_ready_timeout_ms: DEFAULT_TOOLKIT_READY_TIMEOUT.as_millis() as u64,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            gtk: GtkThemeConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: BridgeConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Defaults overridden by `UMBRA_SIGNAL_TYPE` and `UMBRA_TOOLKIT_TIMEOUT_MS`.
    pub fn from_env() -> ConfigResult<Self> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        if let Some(value) = lookup(ENV_SIGNAL_TYPE) {
            self.signal_type = value.parse()?;
        }
        if let Some(value) = lookup(ENV_TOOLKIT_TIMEOUT_MS) {
            self.toolkit_ready_timeout_ms = value.trim().parse::<u64>().map_err(|e| {
                ConfigError::invalid_value(ENV_TOOLKIT_TIMEOUT_MS, format!("'{value}': {e}"))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Serialize to a TOML document.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.toolkit_ready_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "toolkit_ready_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.thread_name.trim().is_empty() {
            return Err(ConfigError::invalid_value("thread_name", "must not be empty"));
        }
        Ok(())
    }

    /// The toolkit readiness timeout as a duration.
    pub fn toolkit_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.toolkit_ready_timeout_ms)
    }

    /// Set the Linux signal source.
    pub fn with_signal_type(mut self, signal_type: SignalType) -> Self {
        self.signal_type = signal_type;
        self
    }

    /// Set the toolkit readiness timeout.
    pub fn with_toolkit_ready_timeout(mut self, timeout: Duration) -> Self {
        self.toolkit_ready_timeout_ms = (timeout.as_millis() as u64).max(1);
        self
    }

    /// Set the subscription thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set the GTK theme classification.
    pub fn with_gtk(mut self, gtk: GtkThemeConfig) -> Self {
        self.gtk = gtk;
        self
    }
}
