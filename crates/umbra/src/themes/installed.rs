//! Enumeration of installed GTK themes.

use std::path::{Path, PathBuf};

use directories::BaseDirs;
use umbra_core::logging::targets;

/// Themes that ship with GTK itself and are always reported.
pub const BUILTIN_THEMES: [&str; 3] = ["Adwaita", "HighContrast", "HighContrastInverse"];

/// GTK 3 minor version whose stylesheet directory is checked.
///
/// GTK 3 is feature-frozen at the 3.24 series, so every GTK 3 runtime
/// reports this minor. The linked `gtk4` reports a GTK 4 minor, which does
/// not name a `gtk-3.N` directory.
pub const GTK3_MINOR_VERSION: u32 = 24;

const DEFAULT_XDG_DATA_DIRS: &str = "/usr/local/share:/usr/share";

/// The directories searched for themes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeSearchPaths {
    /// The user's home directory; `~/.themes` is searched.
    pub home: Option<PathBuf>,
    /// The user data directory (`$XDG_DATA_HOME`); its `themes` child is searched.
    pub user_data: Option<PathBuf>,
    /// System data directories (`$XDG_DATA_DIRS`); each `themes` child is searched.
    pub system_data: Vec<PathBuf>,
}

impl ThemeSearchPaths {
    /// Resolve the search paths for the current user.
    pub fn from_environment() -> Self {
        let base = BaseDirs::new();
        let system_data = std::env::var("XDG_DATA_DIRS")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_XDG_DATA_DIRS.to_string());

        Self {
            home: base.as_ref().map(|dirs| dirs.home_dir().to_path_buf()),
            user_data: base.as_ref().map(|dirs| dirs.data_dir().to_path_buf()),
            system_data: std::env::split_paths(&system_data)
                .filter(|path| !path.as_os_str().is_empty())
                .collect(),
        }
    }

    /// The theme directories to scan, in search order.
    pub fn theme_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::with_capacity(self.system_data.len() + 2);
        if let Some(home) = &self.home {
            dirs.push(home.join(".themes"));
        }
        if let Some(user_data) = &self.user_data {
            dirs.push(user_data.join("themes"));
        }
        dirs.extend(self.system_data.iter().map(|dir| dir.join("themes")));
        dirs
    }
}

/// List installed GTK themes for the current user.
///
/// The built-in themes come first, followed by every theme directory that
/// carries a GTK 3 stylesheet, in discovery order. Names are not sorted; a
/// name found in more than one location is reported once.
pub fn list_installed_themes() -> Vec<String> {
    list_installed_themes_in(&ThemeSearchPaths::from_environment())
}

/// List installed GTK themes under explicit search paths.
pub fn list_installed_themes_in(paths: &ThemeSearchPaths) -> Vec<String> {
    list_installed_themes_for_minor(paths, GTK3_MINOR_VERSION)
}

/// List installed GTK themes whose stylesheets target GTK `3.gtk3_minor`.
///
/// Odd (development) minors are rounded up to the next stable release.
pub fn list_installed_themes_for_minor(paths: &ThemeSearchPaths, gtk3_minor: u32) -> Vec<String> {
    let mut themes: Vec<String> = BUILTIN_THEMES.iter().map(|name| name.to_string()).collect();

    for dir in paths.theme_dirs() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::trace!(target: targets::THEMES, dir = %dir.display(), error = %err, "skipping theme directory");
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !has_gtk3_stylesheet(&path, gtk3_minor) {
                continue;
            }
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if !themes.iter().any(|known| known == name) {
                themes.push(name.to_string());
            }
        }
    }

    tracing::debug!(target: targets::THEMES, count = themes.len(), "listed installed themes");
    themes
}

fn has_gtk3_stylesheet(theme_dir: &Path, gtk3_minor: u32) -> bool {
    let minor = gtk3_minor + gtk3_minor % 2;
    theme_dir.join(format!("gtk-3.{minor}")).join("gtk.css").is_file()
        || theme_dir.join("gtk-3.0").join("gtk.css").is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_dirs_order() {
        let paths = ThemeSearchPaths {
            home: Some(PathBuf::from("/home/user")),
            user_data: Some(PathBuf::from("/home/user/.local/share")),
            system_data: vec![PathBuf::from("/usr/local/share"), PathBuf::from("/usr/share")],
        };
        assert_eq!(
            paths.theme_dirs(),
            vec![
                PathBuf::from("/home/user/.themes"),
                PathBuf::from("/home/user/.local/share/themes"),
                PathBuf::from("/usr/local/share/themes"),
                PathBuf::from("/usr/share/themes"),
            ]
        );
    }

    #[test]
    fn test_no_paths_lists_builtins() {
        assert_eq!(
            list_installed_themes_in(&ThemeSearchPaths::default()),
            BUILTIN_THEMES.to_vec()
        );
    }

    #[test]
    fn test_stylesheet_version_directories() {
        let dir = tempfile::tempdir().unwrap();

        let versioned = dir.path().join("Versioned");
        std::fs::create_dir_all(versioned.join(format!("gtk-3.{GTK3_MINOR_VERSION}"))).unwrap();
        std::fs::write(versioned.join(format!("gtk-3.{GTK3_MINOR_VERSION}/gtk.css")), "").unwrap();
        assert!(has_gtk3_stylesheet(&versioned, GTK3_MINOR_VERSION));

        let legacy = dir.path().join("Legacy");
        std::fs::create_dir_all(legacy.join("gtk-3.0")).unwrap();
        std::fs::write(legacy.join("gtk-3.0/gtk.css"), "").unwrap();
        assert!(has_gtk3_stylesheet(&legacy, GTK3_MINOR_VERSION));

        let gtk2_only = dir.path().join("Old");
        std::fs::create_dir_all(gtk2_only.join("gtk-2.0")).unwrap();
        std::fs::write(gtk2_only.join("gtk-2.0/gtkrc"), "").unwrap();
        assert!(!has_gtk3_stylesheet(&gtk2_only, GTK3_MINOR_VERSION));
    }

    #[test]
    fn test_development_minor_uses_next_stable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let theme = dir.path().join("Next");
        std::fs::create_dir_all(theme.join("gtk-3.22")).unwrap();
        std::fs::write(theme.join("gtk-3.22/gtk.css"), "").unwrap();

        assert!(has_gtk3_stylesheet(&theme, 21));
        assert!(has_gtk3_stylesheet(&theme, 22));
        assert!(!has_gtk3_stylesheet(&theme, GTK3_MINOR_VERSION));
    }
}
