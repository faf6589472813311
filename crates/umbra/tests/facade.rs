//! Integration tests for the notification bridge facade and theme monitor.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, unbounded};
use parking_lot::Mutex;
use umbra::{
    Backend, BackendKind, BridgeConfig, ManualPreferences, ManualTrigger, NotificationBridge,
    PreferenceReader, PreferenceState, SourceFactory, SourceOpener, ThemeMonitor, live_threads,
    manual_source,
};

const TIMEOUT: Duration = Duration::from_secs(2);

static SERIAL: Mutex<()> = Mutex::new(());

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// A factory handing out manual sources; each new trigger is sent to the test.
fn manual_factory() -> (impl SourceFactory, Receiver<ManualTrigger>) {
    let (tx, rx) = unbounded();
    let factory = move || -> SourceOpener {
        let (trigger, source) = manual_source();
        let _ = tx.send(trigger);
        source.into_opener()
    };
    (factory, rx)
}

fn manual_bridge(preferences: &ManualPreferences) -> (NotificationBridge, Receiver<ManualTrigger>) {
    let (factory, triggers) = manual_factory();
    let bridge = NotificationBridge::with_source(
        preferences.clone(),
        factory,
        BridgeConfig::default().with_thread_name("umbra-test-facade"),
    );
    (bridge, triggers)
}

#[test]
fn test_platform_query_is_bounded_and_idempotent() {
    let bridge = NotificationBridge::new(BridgeConfig::default());
    let started = Instant::now();
    let first = bridge.query_state();
    let second = bridge.query_state();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(first, second);
}

#[test]
fn test_no_backend_reports_defaults() {
    let bridge = NotificationBridge::from_backend(
        Backend::unsupported("no backend in tests"),
        BridgeConfig::default(),
    );
    assert_eq!(bridge.backend_kind(), Some(BackendKind::Unsupported));
    assert!(!bridge.is_high_contrast_enabled());
    assert!(!bridge.is_dark_mode_enabled());
}

#[test]
fn test_exactly_once_per_change() {
    let _serial = SERIAL.lock();
    let preferences = ManualPreferences::default();
    let (bridge, triggers) = manual_bridge(&preferences);

    let count = Arc::new(AtomicUsize::new(0));
    let handle = bridge
        .create({
            let count = Arc::clone(&count);
            move || {
                count.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();
    assert!(handle.is_running());
    let trigger = triggers.recv_timeout(TIMEOUT).unwrap();

    trigger.fire();
    assert!(wait_for(|| count.load(Ordering::SeqCst) == 1));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(count.load(Ordering::SeqCst), 1);

    bridge.destroy(handle);
    trigger.fire();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_fire_then_destroy_completes_promptly() {
    let _serial = SERIAL.lock();
    let preferences = ManualPreferences::default();
    let (bridge, triggers) = manual_bridge(&preferences);

    let started = Instant::now();
    let (fired_tx, fired_rx) = unbounded();
    let handle = bridge
        .create(move || {
            let _ = fired_tx.send(());
        })
        .unwrap();
    let trigger = triggers.recv_timeout(TIMEOUT).unwrap();

    preferences.set(PreferenceState::new(true, false));
    trigger.fire();
    fired_rx.recv_timeout(TIMEOUT).unwrap();
    assert!(bridge.query_state().dark_mode_enabled);

    bridge.destroy(handle);
    assert!(started.elapsed() < TIMEOUT);
    assert!(wait_for(|| live_threads() == 0));
}

#[test]
fn test_subscriptions_are_independent() {
    let _serial = SERIAL.lock();
    let preferences = ManualPreferences::default();
    let (bridge, triggers) = manual_bridge(&preferences);

    let first_count = Arc::new(AtomicUsize::new(0));
    let second_count = Arc::new(AtomicUsize::new(0));
    let first = bridge
        .create({
            let count = Arc::clone(&first_count);
            move || {
                count.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();
    let first_trigger = triggers.recv_timeout(TIMEOUT).unwrap();
    let second = bridge
        .create({
            let count = Arc::clone(&second_count);
            move || {
                count.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();
    let second_trigger = triggers.recv_timeout(TIMEOUT).unwrap();
    assert_ne!(first.id(), second.id());

    bridge.destroy(first);
    second_trigger.fire();
    assert!(wait_for(|| second_count.load(Ordering::SeqCst) == 1));

    first_trigger.fire();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(first_count.load(Ordering::SeqCst), 0);

    bridge.destroy(second);
    assert!(wait_for(|| live_threads() == 0));
}

#[test]
fn test_monitor_reports_visible_changes_only() {
    let _serial = SERIAL.lock();
    let preferences = ManualPreferences::default();
    let (bridge, triggers) = manual_bridge(&preferences);

    let (updates_tx, updates) = unbounded();
    let monitor = ThemeMonitor::new(bridge, move |state: PreferenceState| {
        let _ = updates_tx.send(state);
    });

    monitor.start().unwrap();
    assert!(monitor.is_running());
    let trigger = triggers.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(
        updates.recv_timeout(TIMEOUT).unwrap(),
        PreferenceState::fallback()
    );

    // A notification without a visible change is filtered.
    trigger.fire();
    assert!(trigger.wait_until_consumed(TIMEOUT));

    preferences.set(PreferenceState::new(true, false));
    trigger.fire();
    assert_eq!(
        updates.recv_timeout(TIMEOUT).unwrap(),
        PreferenceState::new(true, false)
    );

    // Dark flips underneath high contrast are not reported.
    preferences.set(PreferenceState::new(true, true));
    trigger.fire();
    assert_eq!(
        updates.recv_timeout(TIMEOUT).unwrap(),
        PreferenceState::new(true, true)
    );
    preferences.set(PreferenceState::new(false, true));
    trigger.fire();
    assert!(trigger.wait_until_consumed(TIMEOUT));
    thread::sleep(Duration::from_millis(50));
    assert!(updates.try_recv().is_err());

    monitor.request_update();
    assert_eq!(
        updates.recv_timeout(TIMEOUT).unwrap(),
        PreferenceState::new(false, true)
    );

    monitor.set_running(false).unwrap();
    assert!(!monitor.is_running());
    assert!(wait_for(|| live_threads() == 0));
}

#[test]
fn test_monitor_start_is_idempotent() {
    let _serial = SERIAL.lock();
    let preferences = ManualPreferences::new(PreferenceState::new(true, false));
    let (bridge, triggers) = manual_bridge(&preferences);

    let emitted = Arc::new(AtomicUsize::new(0));
    let monitor = ThemeMonitor::new(bridge, {
        let emitted = Arc::clone(&emitted);
        move |_state: PreferenceState| {
            emitted.fetch_add(1, Ordering::SeqCst);
        }
    });

    monitor.set_running(true).unwrap();
    monitor.set_running(true).unwrap();
    assert_eq!(emitted.load(Ordering::SeqCst), 1);
    assert_eq!(triggers.len(), 1);
    assert!(monitor.state().dark_mode_enabled);

    drop(monitor);
    assert!(wait_for(|| live_threads() == 0));
}

#[test]
fn test_custom_reader_is_used_for_queries() {
    struct AlwaysHighContrast;

    impl PreferenceReader for AlwaysHighContrast {
        fn read_dark_mode(&self) -> bool {
            false
        }

        fn read_high_contrast(&self) -> bool {
            true
        }
    }

    let bridge = NotificationBridge::with_source(
        AlwaysHighContrast,
        || umbra::unsupported_opener("queries only"),
        BridgeConfig::default(),
    );
    assert_eq!(bridge.query_state(), PreferenceState::new(false, true));
    assert_eq!(bridge.backend_kind(), None);
}
