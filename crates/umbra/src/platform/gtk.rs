//! GTK: `gtk-theme-name` on a process-wide toolkit thread.
//!
//! GTK may only be driven from the thread that initialized it, so one toolkit
//! thread per process runs `gtk::init` and the default main loop and is never
//! torn down. Readers wait (bounded) for it to come up; subscriptions post
//! their signal connections into its loop and receive changes over a channel.

use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use gtk4::prelude::*;
use parking_lot::Mutex;
use umbra_core::logging::targets;
use umbra_core::{
    Canceller, ChangeSource, Error, PreferenceReader, PreferenceState, ReadinessGate, Result,
    SourceOpener, Wakeup,
};

use crate::config::GtkThemeConfig;
use crate::themes::classify_theme;

const TOOLKIT_THREAD_NAME: &str = "umbra-gtk";

/// The process-wide toolkit thread and the theme name it last observed.
struct Toolkit {
    ready: ReadinessGate,
    theme_name: Mutex<String>,
}

static TOOLKIT: OnceLock<Arc<Toolkit>> = OnceLock::new();

/// The toolkit, starting its thread on first use.
fn toolkit() -> &'static Arc<Toolkit> {
    TOOLKIT.get_or_init(|| {
        let toolkit = Arc::new(Toolkit {
            ready: ReadinessGate::new("GTK toolkit"),
            theme_name: Mutex::new(String::new()),
        });

        let shared = Arc::clone(&toolkit);
        let spawned = thread::Builder::new()
            .name(TOOLKIT_THREAD_NAME.to_string())
            .spawn(move || run_toolkit(shared));
        if let Err(err) = spawned {
            toolkit
                .ready
                .mark_failed(format!("failed to spawn toolkit thread: {err}"));
        }
        toolkit
    })
}

fn run_toolkit(toolkit: Arc<Toolkit>) {
    if let Err(err) = gtk4::init() {
        tracing::warn!(target: targets::PLATFORM, error = %err, "gtk::init failed");
        toolkit.ready.mark_failed(err.to_string());
        return;
    }
    let Some(settings) = gtk4::Settings::default() else {
        toolkit.ready.mark_failed("no default GTK settings");
        return;
    };

    *toolkit.theme_name.lock() = theme_name(&settings);
    let observer = Arc::clone(&toolkit);
    settings.connect_gtk_theme_name_notify(move |settings| {
        *observer.theme_name.lock() = theme_name(settings);
    });

    tracing::debug!(target: targets::PLATFORM, "GTK toolkit thread ready");
    toolkit.ready.mark_ready();
    glib::MainLoop::new(None, false).run();
}

fn theme_name(settings: &gtk4::Settings) -> String {
    settings
        .gtk_theme_name()
        .map(|name| name.to_string())
        .unwrap_or_default()
}

impl Toolkit {
    /// The current theme name, or an empty name if the toolkit is not ready
    /// within `timeout`.
    fn current_theme(&self, timeout: Duration) -> String {
        match self.ready.wait(timeout) {
            Ok(()) => self.theme_name.lock().clone(),
            Err(err) => {
                tracing::debug!(target: targets::PLATFORM, error = %err, "GTK theme name unavailable");
                String::new()
            }
        }
    }

    /// Run `f` on the toolkit thread.
    fn dispatch(&self, f: impl FnOnce() + Send + 'static) {
        glib::MainContext::default().invoke(f);
    }
}

/// Reader and source factory backed by the shared toolkit thread.
#[derive(Debug, Clone)]
pub struct GtkBackend {
    gtk: GtkThemeConfig,
    ready_timeout: Duration,
}

impl GtkBackend {
    /// Create a backend classifying theme names with `gtk` and waiting at
    /// most `ready_timeout` for the toolkit.
    pub fn new(gtk: GtkThemeConfig, ready_timeout: Duration) -> Self {
        Self { gtk, ready_timeout }
    }

    /// Opener for a [`GtkSource`].
    pub fn opener(&self) -> SourceOpener {
        let timeout = self.ready_timeout;
        Box::new(move || Ok(Box::new(GtkSource::open(timeout)?) as Box<dyn ChangeSource>))
    }
}

impl PreferenceReader for GtkBackend {
    fn read_dark_mode(&self) -> bool {
        self.read_state().dark_mode_enabled
    }

    fn read_high_contrast(&self) -> bool {
        self.read_state().high_contrast_enabled
    }

    fn read_state(&self) -> PreferenceState {
        let name = toolkit().current_theme(self.ready_timeout);
        classify_theme(&name, &self.gtk)
    }
}

enum Message {
    Changed,
    Stop,
}

/// Change source fed by a `notify::gtk-theme-name` handler on the toolkit
/// thread.
pub struct GtkSource {
    handler: Option<glib::SignalHandlerId>,
    sender: Sender<Message>,
    receiver: Receiver<Message>,
    timeout: Duration,
}

impl GtkSource {
    /// Connect a handler on the toolkit thread and wait for it to be in place.
    pub fn open(timeout: Duration) -> Result<Self> {
        let toolkit = toolkit();
        toolkit.ready.wait(timeout)?;

        let (sender, receiver) = crossbeam_channel::unbounded();
        let (connected_tx, connected_rx) = crossbeam_channel::bounded(1);
        let forward = sender.clone();
        toolkit.dispatch(move || {
            let handler = gtk4::Settings::default().map(|settings| {
                settings.connect_gtk_theme_name_notify(move |_| {
                    let _ = forward.send(Message::Changed);
                })
            });
            let _ = connected_tx.send(handler);
        });

        let handler = connected_rx
            .recv_timeout(timeout)
            .ok()
            .flatten()
            .ok_or_else(|| Error::registration("could not connect gtk-theme-name handler"))?;

        tracing::debug!(target: targets::PLATFORM, "gtk-theme-name handler connected");
        Ok(Self {
            handler: Some(handler),
            sender,
            receiver,
            timeout,
        })
    }
}

impl ChangeSource for GtkSource {
    fn wait_for_change(&mut self) -> Wakeup {
        match self.receiver.recv() {
            Ok(Message::Changed) => Wakeup::Changed,
            Ok(Message::Stop) | Err(_) => Wakeup::Stopped,
        }
    }

    fn canceller(&self) -> Canceller {
        let sender = self.sender.clone();
        Canceller::new(move || {
            let _ = sender.send(Message::Stop);
        })
    }
}

impl Drop for GtkSource {
    fn drop(&mut self) {
        let Some(handler) = self.handler.take() else {
            return;
        };
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        toolkit().dispatch(move || {
            if let Some(settings) = gtk4::Settings::default() {
                settings.disconnect(handler);
            }
            let _ = done_tx.send(());
        });
        if done_rx.recv_timeout(self.timeout).is_err() {
            tracing::warn!(target: targets::PLATFORM, "timed out disconnecting gtk-theme-name handler");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_read_is_bounded_by_timeout() {
        let backend = GtkBackend::new(GtkThemeConfig::default(), Duration::from_millis(200));
        let started = Instant::now();
        let _ = backend.read_state();
        // The first read may spend the whole timeout waiting for the toolkit.
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_cancel_unblocks_wait() {
        // Needs a display; without one the toolkit never becomes ready.
        let Ok(mut source) = GtkSource::open(Duration::from_millis(500)) else {
            return;
        };
        source.canceller().cancel();
        assert!(matches!(source.wait_for_change(), Wakeup::Stopped));
    }
}
