//! GNOME: GSettings-backed preference and change notification.
//!
//! The interface schema carries the GTK theme name and, since GNOME 42, the
//! `color-scheme` key. Each subscription owns a private `MainContext`; its
//! `GSettings` objects are created with that context as thread default so
//! their `changed` signals are dispatched only when the subscription thread
//! iterates it.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use gio::prelude::*;
use umbra_core::logging::targets;
use umbra_core::{
    Canceller, ChangeSource, Error, PreferenceReader, PreferenceState, Result, SourceOpener, Wakeup,
};

use crate::config::GtkThemeConfig;
use crate::themes::classify_theme;

const INTERFACE_SCHEMA: &str = "org.gnome.desktop.interface";
const A11Y_SCHEMA: &str = "org.gnome.desktop.a11y.interface";
const GTK_THEME_KEY: &str = "gtk-theme";
const COLOR_SCHEME_KEY: &str = "color-scheme";
const HIGH_CONTRAST_KEY: &str = "high-contrast";
const PREFER_DARK: &str = "prefer-dark";

/// Look up an installed schema. `gio::Settings::new` aborts on unknown
/// schemas, so every construction is guarded by this.
fn lookup_schema(id: &str) -> Option<gio::SettingsSchema> {
    gio::SettingsSchemaSource::default()?.lookup(id, true)
}

/// GSettings-backed reader and source factory.
#[derive(Debug, Clone, Default)]
pub struct GnomeBackend {
    gtk: GtkThemeConfig,
}

impl GnomeBackend {
    /// Create a backend classifying theme names with `gtk`.
    pub fn new(gtk: GtkThemeConfig) -> Self {
        Self { gtk }
    }

    /// Opener for a [`GnomeSource`].
    pub fn opener(&self) -> SourceOpener {
        Box::new(|| Ok(Box::new(GnomeSource::open()?) as Box<dyn ChangeSource>))
    }
}

impl PreferenceReader for GnomeBackend {
    fn read_dark_mode(&self) -> bool {
        self.read_state().dark_mode_enabled
    }

    fn read_high_contrast(&self) -> bool {
        self.read_state().high_contrast_enabled
    }

    fn read_state(&self) -> PreferenceState {
        let Some(schema) = lookup_schema(INTERFACE_SCHEMA) else {
            tracing::debug!(target: targets::PLATFORM, schema = INTERFACE_SCHEMA, "schema not installed");
            return PreferenceState::fallback();
        };

        let settings = gio::Settings::new(INTERFACE_SCHEMA);
        let theme = settings.string(GTK_THEME_KEY);
        let mut state = classify_theme(theme.as_str(), &self.gtk);

        if schema.has_key(COLOR_SCHEME_KEY)
            && settings.string(COLOR_SCHEME_KEY).as_str() == PREFER_DARK
        {
            state.dark_mode_enabled = true;
        }

        if lookup_schema(A11Y_SCHEMA).is_some_and(|a11y| a11y.has_key(HIGH_CONTRAST_KEY)) {
            state.high_contrast_enabled = gio::Settings::new(A11Y_SCHEMA).boolean(HIGH_CONTRAST_KEY);
        }

        tracing::trace!(target: targets::PLATFORM, theme = %theme, %state, "read GNOME preference");
        state
    }
}

/// Change source iterating a private GLib main context.
pub struct GnomeSource {
    // Handlers are disconnected in `Drop`, before the settings objects and
    // the context go away.
    connections: Vec<(gio::Settings, glib::SignalHandlerId)>,
    pending: Rc<Cell<usize>>,
    context: glib::MainContext,
    stop: Arc<AtomicBool>,
}

impl GnomeSource {
    /// Create the context and connect the change handlers.
    pub fn open() -> Result<Self> {
        let interface = lookup_schema(INTERFACE_SCHEMA).ok_or_else(|| {
            Error::registration(format!("GSettings schema {INTERFACE_SCHEMA} is not installed"))
        })?;

        let mut watched = vec![(INTERFACE_SCHEMA, GTK_THEME_KEY)];
        if interface.has_key(COLOR_SCHEME_KEY) {
            watched.push((INTERFACE_SCHEMA, COLOR_SCHEME_KEY));
        }
        if lookup_schema(A11Y_SCHEMA).is_some_and(|s| s.has_key(HIGH_CONTRAST_KEY)) {
            watched.push((A11Y_SCHEMA, HIGH_CONTRAST_KEY));
        }

        let context = glib::MainContext::new();
        let pending = Rc::new(Cell::new(0usize));

        let connections = context
            .with_thread_default(|| {
                let mut settings_by_schema: Vec<(&str, gio::Settings)> = Vec::new();
                let mut connections = Vec::with_capacity(watched.len());

                for &(schema, key) in &watched {
                    let settings = match settings_by_schema.iter().find(|(id, _)| *id == schema) {
                        Some((_, settings)) => settings.clone(),
                        None => {
                            let settings = gio::Settings::new(schema);
                            settings_by_schema.push((schema, settings.clone()));
                            settings
                        }
                    };

                    let counter = Rc::clone(&pending);
                    let id = settings.connect_changed(Some(key), move |_, key| {
                        tracing::trace!(target: targets::PLATFORM, key, "GSettings key changed");
                        counter.set(counter.get() + 1);
                    });
                    // GSettings only emits `changed` for keys that were read.
                    let _ = settings.value(key);
                    connections.push((settings, id));
                }
                connections
            })
            .map_err(|e| Error::registration(format!("could not acquire main context: {e}")))?;

        tracing::debug!(target: targets::PLATFORM, keys = connections.len(), "GSettings handlers connected");
        Ok(Self {
            connections,
            pending,
            context,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl ChangeSource for GnomeSource {
    fn wait_for_change(&mut self) -> Wakeup {
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return Wakeup::Stopped;
            }
            // Changes dispatched within one iteration collapse into one wakeup.
            if self.pending.replace(0) > 0 {
                return Wakeup::Changed;
            }
            self.context.iteration(true);
        }
    }

    fn canceller(&self) -> Canceller {
        let context = self.context.clone();
        let stop = Arc::clone(&self.stop);
        Canceller::new(move || {
            stop.store(true, Ordering::SeqCst);
            context.wakeup();
        })
    }
}

impl Drop for GnomeSource {
    fn drop(&mut self) {
        for (settings, id) in self.connections.drain(..).rev() {
            settings.disconnect(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_state_is_stable() {
        let backend = GnomeBackend::default();
        assert_eq!(backend.read_state(), backend.read_state());
    }

    #[test]
    fn test_missing_schema_lookup() {
        assert!(lookup_schema("io.umbra.no.such.schema").is_none());
    }

    #[test]
    fn test_cancel_unblocks_wait() {
        // Only meaningful where the GNOME schemas are installed.
        let Ok(mut source) = GnomeSource::open() else {
            return;
        };
        source.canceller().cancel();
        assert!(matches!(source.wait_for_change(), Wakeup::Stopped));
    }
}
