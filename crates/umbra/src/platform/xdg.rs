//! XDG desktop portal: `org.freedesktop.appearance` settings.
//!
//! Reads go through `org.freedesktop.portal.Settings.Read` on one
//! process-wide portal thread, which keeps the settings proxy and its session
//! connection for the life of the process. Changes arrive as `SettingChanged`
//! signals; each subscription drives its own match stream on a private
//! current-thread runtime.

use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use ashpd::desktop::settings::Settings;
use ashpd::zbus::{self, MatchRule, MessageStream, zvariant::OwnedValue};
use crossbeam_channel::{Sender, bounded};
use futures_util::StreamExt;
use futures_util::future::{Either, select};
use tokio::runtime::Runtime;
use tokio::sync::{Notify, mpsc};
use umbra_core::logging::targets;
use umbra_core::{
    Canceller, ChangeSource, Error, PreferenceReader, PreferenceState, Result, SourceOpener, Wakeup,
};

const APPEARANCE_NAMESPACE: &str = "org.freedesktop.appearance";
const COLOR_SCHEME_KEY: &str = "color-scheme";
const CONTRAST_KEY: &str = "contrast";
const SETTINGS_INTERFACE: &str = "org.freedesktop.portal.Settings";
const SETTING_CHANGED: &str = "SettingChanged";

const PORTAL_THREAD_NAME: &str = "umbra-portal";
/// Bound on one preference read through the portal thread.
const READ_TIMEOUT: Duration = Duration::from_secs(3);

/// `color-scheme` value meaning "prefer dark".
const PREFER_DARK: u32 = 1;
/// `contrast` value meaning "higher contrast".
const HIGHER_CONTRAST: u32 = 1;

fn runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

/// Returns true for the settings this crate reports on.
fn is_appearance_setting(namespace: &str, key: &str) -> bool {
    namespace == APPEARANCE_NAMESPACE && (key == COLOR_SCHEME_KEY || key == CONTRAST_KEY)
}

type ReadRequest = Sender<PreferenceState>;

/// Requests for the portal thread; `None` if it could not be started.
static PORTAL: OnceLock<Option<mpsc::UnboundedSender<ReadRequest>>> = OnceLock::new();

/// The portal thread's request queue, starting the thread on first use.
fn portal() -> Option<&'static mpsc::UnboundedSender<ReadRequest>> {
    PORTAL
        .get_or_init(|| {
            let rt = match runtime() {
                Ok(rt) => rt,
                Err(err) => {
                    tracing::warn!(target: targets::PLATFORM, error = %err, "failed to build portal runtime");
                    return None;
                }
            };
            let (tx, rx) = mpsc::unbounded_channel();
            let spawned = thread::Builder::new()
                .name(PORTAL_THREAD_NAME.to_string())
                .spawn(move || rt.block_on(serve_reads(rx)));
            match spawned {
                Ok(_) => Some(tx),
                Err(err) => {
                    tracing::warn!(target: targets::PLATFORM, error = %err, "failed to spawn portal thread");
                    None
                }
            }
        })
        .as_ref()
}

async fn serve_reads(mut requests: mpsc::UnboundedReceiver<ReadRequest>) {
    let mut settings: Option<Settings<'static>> = None;
    while let Some(reply) = requests.recv().await {
        let state = match read_appearance(&mut settings).await {
            Ok(state) => state,
            Err(err) => {
                tracing::debug!(target: targets::PLATFORM, error = %err, "portal appearance unavailable");
                // Reconnect on the next read.
                settings = None;
                PreferenceState::fallback()
            }
        };
        // The reader may have given up waiting.
        let _ = reply.send(state);
    }
}

async fn read_appearance(cache: &mut Option<Settings<'static>>) -> ashpd::Result<PreferenceState> {
    if cache.is_none() {
        *cache = Some(Settings::new().await?);
    }
    let Some(settings) = cache.as_ref() else {
        return Ok(PreferenceState::fallback());
    };

    let scheme = settings
        .read::<u32>(APPEARANCE_NAMESPACE, COLOR_SCHEME_KEY)
        .await?;
    // Older portals predate the contrast key.
    let contrast = settings
        .read::<u32>(APPEARANCE_NAMESPACE, CONTRAST_KEY)
        .await
        .unwrap_or_default();
    Ok(PreferenceState::new(
        scheme == PREFER_DARK,
        contrast == HIGHER_CONTRAST,
    ))
}

/// Portal-backed reader and source factory.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortalBackend;

impl PortalBackend {
    /// Opener for a [`PortalSource`].
    pub fn opener(&self) -> SourceOpener {
        Box::new(|| Ok(Box::new(PortalSource::open()?) as Box<dyn ChangeSource>))
    }
}

impl PreferenceReader for PortalBackend {
    fn read_dark_mode(&self) -> bool {
        self.read_state().dark_mode_enabled
    }

    fn read_high_contrast(&self) -> bool {
        self.read_state().high_contrast_enabled
    }

    fn read_state(&self) -> PreferenceState {
        let Some(requests) = portal() else {
            return PreferenceState::fallback();
        };
        let (reply, state) = bounded(1);
        if requests.send(reply).is_err() {
            tracing::debug!(target: targets::PLATFORM, "portal thread has exited");
            return PreferenceState::fallback();
        }
        state.recv_timeout(READ_TIMEOUT).unwrap_or_else(|err| {
            tracing::debug!(target: targets::PLATFORM, error = %err, "portal read timed out");
            PreferenceState::fallback()
        })
    }
}

/// Change source reading `SettingChanged` signals from the session bus.
pub struct PortalSource {
    // Field order is drop order: the stream removes its match rule through
    // the connection, and both need the runtime.
    stream: MessageStream,
    _connection: zbus::Connection,
    runtime: Runtime,
    notify: Arc<Notify>,
    stop: Arc<AtomicBool>,
}

impl PortalSource {
    /// Connect to the session bus and subscribe to portal setting changes.
    pub fn open() -> Result<Self> {
        let runtime = runtime()
            .map_err(|e| Error::registration(format!("failed to build portal runtime: {e}")))?;

        let (connection, stream) = runtime
            .block_on(async {
                let connection = zbus::Connection::session().await?;
                let rule = MatchRule::builder()
                    .msg_type(zbus::message::Type::Signal)
                    .interface(SETTINGS_INTERFACE)?
                    .member(SETTING_CHANGED)?
                    .build();
                let stream = MessageStream::for_match_rule(rule, &connection, None).await?;
                Ok::<_, zbus::Error>((connection, stream))
            })
            .map_err(|e| Error::registration(format!("portal signal subscription failed: {e}")))?;

        tracing::debug!(target: targets::PLATFORM, "portal SettingChanged stream open");
        Ok(Self {
            stream,
            _connection: connection,
            runtime,
            notify: Arc::new(Notify::new()),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl ChangeSource for PortalSource {
    fn wait_for_change(&mut self) -> Wakeup {
        let Self {
            stream,
            runtime,
            notify,
            stop,
            ..
        } = self;

        loop {
            if stop.load(Ordering::SeqCst) {
                return Wakeup::Stopped;
            }

            let next = runtime.block_on(async {
                let cancelled = pin!(notify.notified());
                match select(stream.next(), cancelled).await {
                    Either::Left((item, _)) => Some(item),
                    Either::Right(_) => None,
                }
            });

            let message = match next {
                None => return Wakeup::Stopped,
                Some(None) => return Wakeup::Failed(Error::wait("portal signal stream ended")),
                Some(Some(Err(err))) => {
                    return Wakeup::Failed(Error::wait(format!("portal signal stream failed: {err}")));
                }
                Some(Some(Ok(message))) => message,
            };

            match message.body().deserialize::<(String, String, OwnedValue)>() {
                Ok((namespace, key, _)) if is_appearance_setting(&namespace, &key) => {
                    tracing::trace!(target: targets::PLATFORM, %namespace, %key, "portal setting changed");
                    return Wakeup::Changed;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(target: targets::PLATFORM, error = %err, "ignoring malformed SettingChanged");
                }
            }
        }
    }

    fn canceller(&self) -> Canceller {
        let notify = Arc::clone(&self.notify);
        let stop = Arc::clone(&self.stop);
        Canceller::new(move || {
            stop.store(true, Ordering::SeqCst);
            // Stores a permit when no wait is in progress.
            notify.notify_one();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appearance_filter() {
        assert!(is_appearance_setting(APPEARANCE_NAMESPACE, "color-scheme"));
        assert!(is_appearance_setting(APPEARANCE_NAMESPACE, "contrast"));
        assert!(!is_appearance_setting(APPEARANCE_NAMESPACE, "accent-color"));
        assert!(!is_appearance_setting("org.gnome.desktop.interface", "color-scheme"));
    }

    #[test]
    fn test_read_state_is_stable() {
        let backend = PortalBackend;
        assert_eq!(backend.read_state(), backend.read_state());
    }

    #[test]
    fn test_reads_share_one_portal_thread() {
        let backend = PortalBackend;
        let first = portal();
        let started = std::time::Instant::now();
        for _ in 0..5 {
            backend.read_state();
        }
        match (first, portal()) {
            (Some(a), Some(b)) => assert!(std::ptr::eq(a, b)),
            (None, None) => {}
            _ => panic!("portal thread changed between reads"),
        }
        assert!(started.elapsed() < READ_TIMEOUT * 5);
    }

    #[test]
    fn test_reads_from_many_threads() {
        let readers: Vec<_> = (0..4)
            .map(|_| thread::spawn(|| PortalBackend.read_state()))
            .collect();
        let states: Vec<_> = readers.into_iter().map(|r| r.join().unwrap()).collect();
        assert!(states.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[test]
    fn test_cancel_unblocks_wait() {
        // Needs a session bus.
        let Ok(mut source) = PortalSource::open() else {
            return;
        };
        source.canceller().cancel();
        assert!(matches!(source.wait_for_change(), Wakeup::Stopped));
    }
}
