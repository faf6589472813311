//! GTK theme names: enumeration, variant guessing and classification.

mod installed;
mod variants;

pub use installed::{
    BUILTIN_THEMES, GTK3_MINOR_VERSION, ThemeSearchPaths, list_installed_themes,
    list_installed_themes_for_minor, list_installed_themes_in,
};
pub use variants::{ThemeVariants, guess_variants};

use umbra_core::PreferenceState;

use crate::config::GtkThemeConfig;

/// Classify a GTK theme name as a preference snapshot.
///
/// In guess mode a theme is dark when it is its own night variant, and high
/// contrast is never reported. In explicit mode the name is compared against
/// the configured dark and high-contrast themes.
///
/// ```
/// use umbra::config::GtkThemeConfig;
/// use umbra::themes::classify_theme;
///
/// let config = GtkThemeConfig::default();
/// assert!(classify_theme("Arc-Dark", &config).dark_mode_enabled);
/// assert!(!classify_theme("Arc", &config).dark_mode_enabled);
/// ```
pub fn classify_theme(theme_name: &str, config: &GtkThemeConfig) -> PreferenceState {
    if config.guess_light_and_dark {
        PreferenceState::new(guess_variants(theme_name).is_night(), false)
    } else {
        PreferenceState::new(
            theme_name == config.dark_theme,
            theme_name == config.high_contrast_theme,
        )
    }
}
