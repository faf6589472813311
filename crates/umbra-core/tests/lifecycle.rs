//! Integration tests for the subscription lifecycle.
//!
//! Every test drives a manual change source, so they exercise the real
//! thread, cancellation and delivery paths without touching OS settings.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use umbra_core::{
    DeliveryError, FallibleCallback, HostCallback, Phase, Subscription, SubscriptionOptions,
    live_threads, manual_source, unsupported_opener,
};

const TIMEOUT: Duration = Duration::from_secs(2);

// The live thread counter is process-wide; tests that create subscriptions
// take this lock so counts are not disturbed by neighbours.
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

fn counting_callback() -> (Arc<AtomicUsize>, Box<dyn HostCallback>) {
    let count = Arc::new(AtomicUsize::new(0));
    let callback = {
        let count = Arc::clone(&count);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
        }
    };
    (count, Box::new(callback))
}

fn options() -> SubscriptionOptions {
    SubscriptionOptions::default().with_thread_name("umbra-test-watch")
}

#[test]
fn test_one_delivery_per_change() {
    let _serial = SERIAL.lock();
    let (trigger, source) = manual_source();
    let (count, callback) = counting_callback();
    let subscription = Subscription::spawn(source.into_opener(), callback, options()).unwrap();

    for _ in 0..3 {
        trigger.fire();
    }
    assert!(wait_for(|| count.load(Ordering::SeqCst) == 3));

    // No spurious extra deliveries.
    thread::sleep(Duration::from_millis(50));
    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert_eq!(subscription.delivered(), 3);

    subscription.destroy();
}

#[test]
fn test_no_delivery_after_destroy() {
    let _serial = SERIAL.lock();
    let (trigger, source) = manual_source();
    let (count, callback) = counting_callback();
    let subscription = Subscription::spawn(source.into_opener(), callback, options()).unwrap();

    subscription.destroy();
    assert!(trigger.is_closed());

    trigger.fire();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_change_racing_destroy_fires_at_most_once() {
    let _serial = SERIAL.lock();
    for _ in 0..20 {
        let (trigger, source) = manual_source();
        let (count, callback) = counting_callback();
        let subscription = Subscription::spawn(source.into_opener(), callback, options()).unwrap();

        trigger.fire();
        subscription.destroy();
        let after_destroy = count.load(Ordering::SeqCst);
        assert!(after_destroy <= 1);

        trigger.fire();
        thread::sleep(Duration::from_millis(5));
        assert_eq!(count.load(Ordering::SeqCst), after_destroy);
    }
}

#[test]
fn test_thread_count_returns_to_zero() {
    let _serial = SERIAL.lock();
    assert!(wait_for(|| live_threads() == 0));

    let mut triggers = Vec::new();
    let mut subscriptions = Vec::new();
    for _ in 0..4 {
        let (trigger, source) = manual_source();
        let (_count, callback) = counting_callback();
        subscriptions.push(Subscription::spawn(source.into_opener(), callback, options()).unwrap());
        triggers.push(trigger);
    }
    assert_eq!(live_threads(), 4);

    for subscription in subscriptions {
        subscription.destroy();
    }
    assert_eq!(live_threads(), 0);
    assert!(triggers.iter().all(|trigger| trigger.is_closed()));
}

#[test]
fn test_subscriptions_are_independent() {
    let _serial = SERIAL.lock();
    let (trigger_a, source_a) = manual_source();
    let (trigger_b, source_b) = manual_source();
    let (count_a, callback_a) = counting_callback();
    let (count_b, callback_b) = counting_callback();

    let a = Subscription::spawn(source_a.into_opener(), callback_a, options()).unwrap();
    let b = Subscription::spawn(source_b.into_opener(), callback_b, options()).unwrap();
    assert_ne!(a.id(), b.id());

    trigger_a.fire();
    assert!(wait_for(|| count_a.load(Ordering::SeqCst) == 1));
    assert_eq!(count_b.load(Ordering::SeqCst), 0);

    a.destroy();
    assert!(trigger_a.is_closed());
    assert!(!trigger_b.is_closed());

    trigger_b.fire();
    assert!(wait_for(|| count_b.load(Ordering::SeqCst) == 1));
    assert_eq!(count_a.load(Ordering::SeqCst), 1);

    b.destroy();
}

#[test]
fn test_wait_failure_ends_subscription_without_retry() {
    let _serial = SERIAL.lock();
    let (trigger, source) = manual_source();
    let (count, callback) = counting_callback();
    let subscription = Subscription::spawn(source.into_opener(), callback, options()).unwrap();

    trigger.fail("notification handle closed");
    assert!(wait_for(|| subscription.phase() == Phase::Stopped));
    assert!(wait_for(|| trigger.is_closed()));

    trigger.fire();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(count.load(Ordering::SeqCst), 0);

    subscription.destroy();
}

#[test]
fn test_open_failure_never_fires() {
    let _serial = SERIAL.lock();
    let (count, callback) = counting_callback();
    let subscription =
        Subscription::spawn(unsupported_opener("no source here"), callback, options()).unwrap();

    assert_eq!(subscription.phase(), Phase::Stopped);
    subscription.destroy();
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(live_threads(), 0);
}

#[test]
fn test_callback_failures_are_contained() {
    let _serial = SERIAL.lock();
    let (trigger, source) = manual_source();
    let calls = Arc::new(AtomicUsize::new(0));
    let callback = FallibleCallback({
        let calls = Arc::clone(&calls);
        move || -> Result<(), DeliveryError> {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 => Err(DeliveryError::unresolved("run()V")),
                1 => Err(DeliveryError::failed("exception thrown")),
                2 => panic!("host panicked"),
                _ => Ok(()),
            }
        }
    });
    let subscription =
        Subscription::spawn(source.into_opener(), Box::new(callback), options()).unwrap();

    for _ in 0..4 {
        trigger.fire();
    }
    assert!(wait_for(|| subscription.delivered() == 1));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(subscription.is_running());

    let stats = subscription.stats();
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.failed, 2);

    subscription.destroy();
}

#[test]
fn test_destroy_from_inside_callback() {
    let _serial = SERIAL.lock();
    let (trigger, source) = manual_source();
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let count = Arc::new(AtomicUsize::new(0));

    let callback = {
        let slot = Arc::clone(&slot);
        let count = Arc::clone(&count);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            let subscription = slot.lock().take();
            if let Some(subscription) = subscription {
                subscription.destroy();
            }
        }
    };
    let subscription = Subscription::spawn(source.into_opener(), Box::new(callback), options()).unwrap();
    *slot.lock() = Some(subscription);

    trigger.fire();
    assert!(wait_for(|| trigger.is_closed()));
    assert!(wait_for(|| live_threads() == 0));

    trigger.fire();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_fire_then_destroy_completes_quickly() {
    let _serial = SERIAL.lock();
    let started = Instant::now();

    let (trigger, source) = manual_source();
    let (count, callback) = counting_callback();
    let subscription = Subscription::spawn(source.into_opener(), callback, options()).unwrap();

    trigger.fire();
    assert!(wait_for(|| count.load(Ordering::SeqCst) == 1));
    subscription.destroy();

    assert!(started.elapsed() < TIMEOUT);
}

#[test]
fn test_drop_destroys() {
    let _serial = SERIAL.lock();
    let (trigger, source) = manual_source();
    let (_count, callback) = counting_callback();
    let subscription = Subscription::spawn(source.into_opener(), callback, options()).unwrap();

    drop(subscription);
    assert!(trigger.is_closed());
    assert_eq!(live_threads(), 0);
}
