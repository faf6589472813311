//! macOS: user defaults and the distributed theme-change notification.
//!
//! Dark mode is `AppleInterfaceStyle == "Dark"` in the global user defaults.
//! Changes are observed through `AppleInterfaceThemeChangedNotification` on
//! the distributed notification center, delivered to the subscription
//! thread's run loop.

use std::ffi::c_void;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use core_foundation::base::{CFIndex, CFRelease, TCFType};
use core_foundation::dictionary::CFDictionaryRef;
use core_foundation::runloop::{CFRunLoop, CFRunLoopRef, CFRunLoopRunResult, kCFRunLoopDefaultMode};
use core_foundation::string::{CFString, CFStringRef};
use objc2_foundation::{NSString, NSUserDefaults};
use umbra_core::logging::targets;
use umbra_core::{
    Canceller, ChangeSource, Error, PreferenceReader, Result, SourceOpener, Wakeup,
};

use super::high_contrast;

const THEME_CHANGED_NOTIFICATION: &str = "AppleInterfaceThemeChangedNotification";
const INTERFACE_STYLE_KEY: &str = "AppleInterfaceStyle";

/// Upper bound on one run-loop pass; the loop re-enters until woken.
const RUN_LOOP_SLICE: Duration = Duration::from_secs(60 * 60);

type CFNotificationCenterRef = *mut c_void;
type CFNotificationCallback = extern "C" fn(
    center: CFNotificationCenterRef,
    observer: *mut c_void,
    name: CFStringRef,
    object: *const c_void,
    user_info: CFDictionaryRef,
);

/// `CFNotificationSuspensionBehaviorDeliverImmediately`
const DELIVER_IMMEDIATELY: CFIndex = 4;

type CFRunLoopSourceRef = *mut c_void;

/// Version 0 `CFRunLoopSourceContext`.
#[repr(C)]
struct CFRunLoopSourceContext {
    version: CFIndex,
    info: *mut c_void,
    retain: Option<extern "C" fn(info: *const c_void) -> *const c_void>,
    release: Option<extern "C" fn(info: *const c_void)>,
    copy_description: Option<extern "C" fn(info: *const c_void) -> CFStringRef>,
    equal: Option<extern "C" fn(a: *const c_void, b: *const c_void) -> u8>,
    hash: Option<extern "C" fn(info: *const c_void) -> usize>,
    schedule: Option<extern "C" fn(info: *mut c_void, rl: CFRunLoopRef, mode: CFStringRef)>,
    cancel: Option<extern "C" fn(info: *mut c_void, rl: CFRunLoopRef, mode: CFStringRef)>,
    perform: Option<extern "C" fn(info: *mut c_void)>,
}

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    fn CFNotificationCenterGetDistributedCenter() -> CFNotificationCenterRef;
    fn CFNotificationCenterAddObserver(
        center: CFNotificationCenterRef,
        observer: *const c_void,
        callback: CFNotificationCallback,
        name: CFStringRef,
        object: *const c_void,
        suspension_behavior: CFIndex,
    );
    fn CFNotificationCenterRemoveObserver(
        center: CFNotificationCenterRef,
        observer: *const c_void,
        name: CFStringRef,
        object: *const c_void,
    );

    fn CFRunLoopSourceCreate(
        allocator: *const c_void,
        order: CFIndex,
        context: *mut CFRunLoopSourceContext,
    ) -> CFRunLoopSourceRef;
    fn CFRunLoopSourceSignal(source: CFRunLoopSourceRef);
    fn CFRunLoopSourceInvalidate(source: CFRunLoopSourceRef);
    fn CFRunLoopAddSource(rl: CFRunLoopRef, source: CFRunLoopSourceRef, mode: CFStringRef);
    fn CFRunLoopWakeUp(rl: CFRunLoopRef);
}

/// User-defaults reader and source factory.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppearanceBackend;

impl AppearanceBackend {
    /// Opener for an [`AppearanceSource`].
    pub fn opener(&self) -> SourceOpener {
        Box::new(|| Ok(Box::new(AppearanceSource::open()?) as Box<dyn ChangeSource>))
    }
}

impl PreferenceReader for AppearanceBackend {
    fn read_dark_mode(&self) -> bool {
        let key = NSString::from_str(INTERFACE_STYLE_KEY);
        #[allow(unused_unsafe)]
        // SAFETY: standardUserDefaults is thread-safe and the key is a live
        // NSString.
        let style = unsafe { NSUserDefaults::standardUserDefaults().stringForKey(&key) };
        // The key is absent in light mode.
        style.is_some_and(|style| style.to_string() == "Dark")
    }

    fn read_high_contrast(&self) -> bool {
        high_contrast::is_enabled()
    }
}

extern "C" fn on_theme_changed(
    _center: CFNotificationCenterRef,
    observer: *mut c_void,
    _name: CFStringRef,
    _object: *const c_void,
    _user_info: CFDictionaryRef,
) {
    // SAFETY: `observer` is the counter registered in `AppearanceSource::open`,
    // which outlives the registration.
    let pending = unsafe { &*(observer as *const AtomicUsize) };
    pending.fetch_add(1, Ordering::SeqCst);
}

// The pass ends because the source was handled; the stop flag says why.
extern "C" fn on_wake(_info: *mut c_void) {}

/// The subscription thread's run loop and its private wake source.
///
/// A signalled source stays pending until a pass handles it, so a wake
/// requested before the thread enters the loop ends the next pass.
struct WakeSource {
    run_loop: CFRunLoop,
    source: CFRunLoopSourceRef,
}

// SAFETY: CFRunLoopSourceSignal and CFRunLoopWakeUp are documented as
// callable from any thread; the source is retained until `Drop`.
unsafe impl Send for WakeSource {}
unsafe impl Sync for WakeSource {}

impl WakeSource {
    fn attach(run_loop: CFRunLoop) -> Result<Self> {
        let mut context = CFRunLoopSourceContext {
            version: 0,
            info: std::ptr::null_mut(),
            retain: None,
            release: None,
            copy_description: None,
            equal: None,
            hash: None,
            schedule: None,
            cancel: None,
            perform: Some(on_wake),
        };
        // SAFETY: the context is copied by CFRunLoopSourceCreate.
        let source = unsafe { CFRunLoopSourceCreate(std::ptr::null(), 0, &mut context) };
        if source.is_null() {
            return Err(Error::registration("CFRunLoopSourceCreate returned null"));
        }
        // SAFETY: both references are live; reading an immutable constant.
        unsafe {
            CFRunLoopAddSource(
                run_loop.as_concrete_TypeRef(),
                source,
                kCFRunLoopDefaultMode,
            )
        };
        Ok(Self { run_loop, source })
    }

    fn wake(&self) {
        // SAFETY: the source and run loop are retained by `self`.
        unsafe {
            CFRunLoopSourceSignal(self.source);
            CFRunLoopWakeUp(self.run_loop.as_concrete_TypeRef());
        }
    }
}

impl Drop for WakeSource {
    fn drop(&mut self) {
        // SAFETY: releases the reference obtained from CFRunLoopSourceCreate.
        unsafe { CFRelease(self.source as *const c_void) };
    }
}

/// Change source observing the distributed theme notification on the
/// subscription thread's run loop.
pub struct AppearanceSource {
    // Also keeps the run loop non-empty so a pass blocks instead of
    // returning `Finished` immediately.
    wake: Arc<WakeSource>,
    name: CFString,
    pending: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
}

impl AppearanceSource {
    /// Register the observer on the current thread's run loop.
    pub fn open() -> Result<Self> {
        let wake = WakeSource::attach(CFRunLoop::get_current())?;
        let name = CFString::new(THEME_CHANGED_NOTIFICATION);
        let pending = Arc::new(AtomicUsize::new(0));

        // SAFETY: the observer pointer stays valid until it is removed in
        // `Drop`; the name is a live CFString.
        unsafe {
            CFNotificationCenterAddObserver(
                CFNotificationCenterGetDistributedCenter(),
                Arc::as_ptr(&pending) as *const c_void,
                on_theme_changed,
                name.as_concrete_TypeRef(),
                std::ptr::null(),
                DELIVER_IMMEDIATELY,
            );
        }

        tracing::debug!(target: targets::PLATFORM, "theme change observer registered");
        Ok(Self {
            wake: Arc::new(wake),
            name,
            pending,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl ChangeSource for AppearanceSource {
    fn wait_for_change(&mut self) -> Wakeup {
        // SAFETY: reading an immutable CoreFoundation constant.
        let mode = unsafe { kCFRunLoopDefaultMode };
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return Wakeup::Stopped;
            }
            if self.pending.swap(0, Ordering::SeqCst) > 0 {
                return Wakeup::Changed;
            }
            if let CFRunLoopRunResult::Finished = CFRunLoop::run_in_mode(mode, RUN_LOOP_SLICE, true)
            {
                tracing::trace!(target: targets::PLATFORM, "run loop pass finished");
            }
        }
    }

    fn canceller(&self) -> Canceller {
        let wake = Arc::clone(&self.wake);
        let stop = Arc::clone(&self.stop);
        Canceller::new(move || {
            stop.store(true, Ordering::SeqCst);
            wake.wake();
        })
    }
}

impl Drop for AppearanceSource {
    fn drop(&mut self) {
        // SAFETY: removes exactly the registration made in `open`.
        unsafe {
            CFNotificationCenterRemoveObserver(
                CFNotificationCenterGetDistributedCenter(),
                Arc::as_ptr(&self.pending) as *const c_void,
                self.name.as_concrete_TypeRef(),
                std::ptr::null(),
            );
            // Detaches the source from the run loop; a late cancel signals
            // an invalidated source, which is a no-op.
            CFRunLoopSourceInvalidate(self.wake.source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_are_stable() {
        let backend = AppearanceBackend;
        assert_eq!(backend.read_dark_mode(), backend.read_dark_mode());
        assert_eq!(backend.read_high_contrast(), backend.read_high_contrast());
    }

    #[test]
    fn test_cancel_unblocks_wait() {
        let mut source = AppearanceSource::open().unwrap();
        source.canceller().cancel();
        assert!(matches!(source.wait_for_change(), Wakeup::Stopped));
    }

    #[test]
    fn test_wake_before_entering_the_loop_is_kept() {
        let _source = AppearanceSource::open().unwrap();
        let wake = WakeSource::attach(CFRunLoop::get_current()).unwrap();
        wake.wake();

        // SAFETY: reading an immutable CoreFoundation constant.
        let mode = unsafe { kCFRunLoopDefaultMode };
        let started = std::time::Instant::now();
        let result = CFRunLoop::run_in_mode(mode, Duration::from_secs(5), true);
        assert!(matches!(result, CFRunLoopRunResult::HandledSource));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_cancel_from_another_thread_ends_a_blocked_wait() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let waiter = std::thread::spawn(move || {
            let mut source = AppearanceSource::open().unwrap();
            tx.send(source.canceller()).unwrap();
            matches!(source.wait_for_change(), Wakeup::Stopped)
        });
        let canceller = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        canceller.cancel();
        assert!(waiter.join().unwrap());
    }
}
