//! Windows: registry-backed preference and change notification.
//!
//! Dark mode is the `AppsUseLightTheme` DWORD under the current user's
//! theme personalization key (`0` means dark). Changes are observed with
//! `RegNotifyChangeKeyValue` on the personalization key and the high
//! contrast accessibility key, both signalling one auto-reset event.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use umbra_core::logging::targets;
use umbra_core::{Canceller, ChangeSource, Error, PreferenceReader, Result, SourceOpener, Wakeup};
use windows::Win32::Foundation::{
    CloseHandle, ERROR_FILE_NOT_FOUND, ERROR_SUCCESS, HANDLE, WAIT_OBJECT_0, WIN32_ERROR,
};
use windows::Win32::System::Registry::{
    HKEY, HKEY_CURRENT_USER, KEY_NOTIFY, REG_NOTIFY_CHANGE_LAST_SET, RRF_RT_REG_DWORD,
    RRF_SUBKEY_WOW6464KEY, RegCloseKey, RegGetValueW, RegNotifyChangeKeyValue, RegOpenKeyExW,
};
use windows::Win32::System::Threading::{CreateEventW, INFINITE, SetEvent, WaitForSingleObject};
use windows::core::{PCWSTR, w};

use super::high_contrast;

const PERSONALIZE_KEY: PCWSTR =
    w!("Software\\Microsoft\\Windows\\CurrentVersion\\Themes\\Personalize");
const HIGH_CONTRAST_KEY: PCWSTR = w!("Control Panel\\Accessibility\\HighContrast");
const APPS_USE_LIGHT_THEME: PCWSTR = w!("AppsUseLightTheme");

/// Registry-backed reader and source factory.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryBackend;

impl RegistryBackend {
    /// Opener for a [`RegistrySource`].
    pub fn opener(&self) -> SourceOpener {
        Box::new(|| Ok(Box::new(RegistrySource::open()?) as Box<dyn ChangeSource>))
    }
}

impl PreferenceReader for RegistryBackend {
    fn read_dark_mode(&self) -> bool {
        match read_dword(PERSONALIZE_KEY, APPS_USE_LIGHT_THEME) {
            Ok(value) => value == 0,
            Err(status) if status == ERROR_FILE_NOT_FOUND => {
                tracing::debug!(target: targets::PLATFORM, "AppsUseLightTheme is not configured");
                false
            }
            Err(status) => {
                tracing::warn!(
                    target: targets::PLATFORM,
                    status = status.0,
                    "failed to read AppsUseLightTheme"
                );
                false
            }
        }
    }

    fn read_high_contrast(&self) -> bool {
        high_contrast::is_enabled()
    }
}

fn read_dword(subkey: PCWSTR, value: PCWSTR) -> std::result::Result<u32, WIN32_ERROR> {
    let mut data: u32 = 0;
    let mut size = std::mem::size_of::<u32>() as u32;

    // SAFETY: `subkey` and `value` are static NUL-terminated wide strings;
    // `data` and `size` are live locals sized for a DWORD.
    let status = unsafe {
        RegGetValueW(
            HKEY_CURRENT_USER,
            subkey,
            value,
            RRF_RT_REG_DWORD | RRF_SUBKEY_WOW6464KEY,
            None,
            Some(&mut data as *mut u32 as *mut std::ffi::c_void),
            Some(&mut size),
        )
    };

    if status == ERROR_SUCCESS {
        Ok(data)
    } else {
        Err(status)
    }
}

/// An event handle that can be signalled from any thread.
struct OwnedEvent(HANDLE);

// SAFETY: event handles are process-wide kernel objects; SetEvent and
// WaitForSingleObject may be called on them from any thread.
unsafe impl Send for OwnedEvent {}
unsafe impl Sync for OwnedEvent {}

impl Drop for OwnedEvent {
    fn drop(&mut self) {
        // SAFETY: the handle came from CreateEventW and is closed exactly once.
        let _ = unsafe { CloseHandle(self.0) };
    }
}

struct OwnedKey(HKEY);

impl Drop for OwnedKey {
    fn drop(&mut self) {
        // SAFETY: the key came from RegOpenKeyExW and is closed exactly once.
        // Closing it also drops any pending change notification.
        let _ = unsafe { RegCloseKey(self.0) };
    }
}

/// Change source watching the theme and accessibility registry keys.
pub struct RegistrySource {
    // Dropped first: closing the keys cancels their notifications before the
    // event they signal goes away.
    keys: Vec<OwnedKey>,
    event: Arc<OwnedEvent>,
    stop: Arc<AtomicBool>,
    // Notifications are one-shot and re-armed before the next wait.
    needs_arm: bool,
}

impl RegistrySource {
    /// Create the event, open both keys and arm their notifications.
    pub fn open() -> Result<Self> {
        // SAFETY: default security, auto-reset, initially unsignalled, unnamed.
        let event = unsafe { CreateEventW(None, false, false, PCWSTR::null()) }
            .map_err(|e| Error::registration(format!("CreateEventW failed: {e}")))?;
        let event = Arc::new(OwnedEvent(event));

        let mut keys = vec![open_notify_key(PERSONALIZE_KEY)?];
        match open_notify_key(HIGH_CONTRAST_KEY) {
            Ok(key) => keys.push(key),
            Err(err) => {
                tracing::debug!(target: targets::PLATFORM, error = %err, "high contrast key not watched");
            }
        }

        let source = Self {
            keys,
            event,
            stop: Arc::new(AtomicBool::new(false)),
            needs_arm: false,
        };
        source.arm()?;
        tracing::debug!(target: targets::PLATFORM, "registry notifications armed");
        Ok(source)
    }

    fn arm(&self) -> Result<()> {
        for key in &self.keys {
            // SAFETY: the key is open with KEY_NOTIFY and the event is alive
            // for as long as `self`.
            let status = unsafe {
                RegNotifyChangeKeyValue(key.0, false, REG_NOTIFY_CHANGE_LAST_SET, self.event.0, true)
            };
            if status != ERROR_SUCCESS {
                return Err(Error::registration(format!(
                    "RegNotifyChangeKeyValue failed with status {}",
                    status.0
                )));
            }
        }
        Ok(())
    }
}

fn open_notify_key(subkey: PCWSTR) -> Result<OwnedKey> {
    let mut key = HKEY::default();
    // SAFETY: `subkey` is a static wide string and `key` a live out-parameter.
    let status = unsafe { RegOpenKeyExW(HKEY_CURRENT_USER, subkey, 0, KEY_NOTIFY, &mut key) };
    if status == ERROR_SUCCESS {
        Ok(OwnedKey(key))
    } else {
        Err(Error::registration(format!(
            "RegOpenKeyExW failed with status {}",
            status.0
        )))
    }
}

impl ChangeSource for RegistrySource {
    fn wait_for_change(&mut self) -> Wakeup {
        if self.stop.load(Ordering::SeqCst) {
            return Wakeup::Stopped;
        }
        if self.needs_arm {
            if let Err(err) = self.arm() {
                return Wakeup::Failed(err);
            }
            self.needs_arm = false;
        }

        // SAFETY: the event handle is owned by `self.event` and still open.
        let wait = unsafe { WaitForSingleObject(self.event.0, INFINITE) };
        if wait != WAIT_OBJECT_0 {
            return Wakeup::Failed(Error::wait(format!(
                "WaitForSingleObject returned {:#x}",
                wait.0
            )));
        }

        if self.stop.load(Ordering::SeqCst) {
            return Wakeup::Stopped;
        }

        self.needs_arm = true;
        Wakeup::Changed
    }

    fn canceller(&self) -> Canceller {
        let event = Arc::clone(&self.event);
        let stop = Arc::clone(&self.stop);
        Canceller::new(move || {
            stop.store(true, Ordering::SeqCst);
            // SAFETY: the handle stays open while `event` is alive.
            if let Err(err) = unsafe { SetEvent(event.0) } {
                tracing::warn!(target: targets::PLATFORM, error = %err, "SetEvent failed");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_are_bounded_and_stable() {
        let backend = RegistryBackend;
        assert_eq!(backend.read_dark_mode(), backend.read_dark_mode());
    }

    #[test]
    fn test_missing_value_is_an_error() {
        assert!(read_dword(PERSONALIZE_KEY, w!("UmbraNoSuchValue")).is_err());
    }

    #[test]
    fn test_cancel_unblocks_wait() {
        let mut source = RegistrySource::open().unwrap();
        source.canceller().cancel();
        assert!(matches!(source.wait_for_change(), Wakeup::Stopped));
    }

    #[test]
    fn test_change_is_reported_before_rearm_failure() {
        let mut source = RegistrySource::open().unwrap();
        // SAFETY: the event is owned by the source and still open.
        unsafe { SetEvent(source.event.0) }.unwrap();
        assert!(matches!(source.wait_for_change(), Wakeup::Changed));

        // A key that can no longer be armed fails the next wait, not the
        // change that was already observed.
        source.keys.push(OwnedKey(HKEY::default()));
        assert!(matches!(source.wait_for_change(), Wakeup::Failed(_)));
    }
}
