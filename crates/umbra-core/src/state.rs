//! Preference snapshots.

use std::fmt;

/// A point-in-time snapshot of the system appearance preference.
///
/// Snapshots are produced fresh by every query. Nothing is cached between
/// queries, so two snapshots taken around an OS change may differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PreferenceState {
    /// Whether the dark appearance is active.
    pub dark_mode_enabled: bool,
    /// Whether the high-contrast accessibility setting is active.
    pub high_contrast_enabled: bool,
}

impl PreferenceState {
    /// Create a snapshot from its two flags.
    pub const fn new(dark_mode_enabled: bool, high_contrast_enabled: bool) -> Self {
        Self {
            dark_mode_enabled,
            high_contrast_enabled,
        }
    }

    /// The value reported when a platform cannot be queried: light, normal contrast.
    pub const fn fallback() -> Self {
        Self::new(false, false)
    }

    /// Returns true if this snapshot describes a visibly different appearance
    /// from `previous`.
    ///
    /// A high-contrast toggle always counts. While high contrast is on, the
    /// dark flag is ignored since the high-contrast theme overrides it.
    pub fn differs_from(&self, previous: &PreferenceState) -> bool {
        self.high_contrast_enabled != previous.high_contrast_enabled
            || (!self.high_contrast_enabled && self.dark_mode_enabled != previous.dark_mode_enabled)
    }
}

impl fmt::Display for PreferenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.dark_mode_enabled { "dark" } else { "light" };
        if self.high_contrast_enabled {
            write!(f, "{scheme} (high contrast)")
        } else {
            write!(f, "{scheme}")
        }
    }
}
