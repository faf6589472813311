//! JNI bindings for Umbra.
//!
//! Exports the native methods of `io.umbra.NativeThemeBridge`:
//!
//! ```java
//! final class NativeThemeBridge {
//!     static native boolean init(int signalType);
//!     static native boolean isDarkThemeEnabled();
//!     static native boolean isHighContrastEnabled();
//!     static native long createEventHandler(Runnable callback);
//!     static native void deleteEventHandler(long handle);
//!     static native ArrayList<String> getInstalledThemes();
//! }
//! ```
//!
//! `createEventHandler` returns `0` when the callback cannot be registered.
//! Logging goes to stderr and is filtered by the `UMBRA_LOG` environment
//! variable (default `warn`).

mod callback;
mod handles;

use std::sync::{LazyLock, Once};

use jni::JNIEnv;
use jni::objects::{JClass, JObject, JValue};
use jni::sys::{JNI_FALSE, JNI_TRUE, jboolean, jint, jlong, jobject};
use parking_lot::{Mutex, RwLock};
use umbra::logging::targets;
use umbra::{BridgeConfig, NotificationBridge, SignalType, SubscriptionHandle};

pub use callback::JniCallback;
pub use handles::{HandleKey, HandleTable};

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "UMBRA_LOG";

static LOGGING: Once = Once::new();
static BRIDGE: RwLock<Option<NotificationBridge>> = RwLock::new(None);
static HANDLES: LazyLock<Mutex<HandleTable<SubscriptionHandle>>> =
    LazyLock::new(|| Mutex::new(HandleTable::new()));

/// Install the stderr log subscriber once per process.
///
/// Does nothing if the host already installed a global subscriber.
pub fn init_logging() {
    LOGGING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

fn base_config() -> BridgeConfig {
    BridgeConfig::from_env().unwrap_or_else(|err| {
        tracing::warn!(target: targets::HOST, error = %err, "ignoring invalid environment configuration");
        BridgeConfig::default()
    })
}

/// The process-wide bridge, created from the environment on first use.
fn bridge() -> NotificationBridge {
    if let Some(bridge) = BRIDGE.read().as_ref() {
        return bridge.clone();
    }
    BRIDGE
        .write()
        .get_or_insert_with(|| {
            init_logging();
            NotificationBridge::new(base_config())
        })
        .clone()
}

/// Replace the process-wide bridge with one using `signal_type`.
///
/// Existing subscriptions keep running on the bridge they were created with.
pub fn init_bridge(signal_type: jint) -> bool {
    init_logging();
    let Some(signal_type) = SignalType::from_index(signal_type) else {
        tracing::warn!(target: targets::HOST, signal_type, "unknown signal type");
        return false;
    };
    let bridge = NotificationBridge::new(base_config().with_signal_type(signal_type));
    tracing::info!(
        target: targets::HOST,
        %signal_type,
        backend = ?bridge.backend_kind(),
        "theme bridge initialized"
    );
    *BRIDGE.write() = Some(bridge);
    true
}

fn to_jboolean(value: bool) -> jboolean {
    if value { JNI_TRUE } else { JNI_FALSE }
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_io_umbra_NativeThemeBridge_init(
    _env: JNIEnv<'_>,
    _class: JClass<'_>,
    signal_type: jint,
) -> jboolean {
    to_jboolean(init_bridge(signal_type))
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_io_umbra_NativeThemeBridge_isDarkThemeEnabled(
    _env: JNIEnv<'_>,
    _class: JClass<'_>,
) -> jboolean {
    to_jboolean(bridge().is_dark_mode_enabled())
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_io_umbra_NativeThemeBridge_isHighContrastEnabled(
    _env: JNIEnv<'_>,
    _class: JClass<'_>,
) -> jboolean {
    to_jboolean(bridge().is_high_contrast_enabled())
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_io_umbra_NativeThemeBridge_createEventHandler(
    mut env: JNIEnv<'_>,
    _class: JClass<'_>,
    runnable: JObject<'_>,
) -> jlong {
    let callback = match JniCallback::new(&mut env, &runnable) {
        Ok(callback) => callback,
        Err(err) => {
            tracing::warn!(target: targets::HOST, error = %err, "event handler not created");
            return 0;
        }
    };

    match bridge().create(callback) {
        Ok(handle) => HANDLES.lock().insert(handle),
        Err(err) => {
            tracing::warn!(target: targets::HOST, error = %err, "event handler not created");
            0
        }
    }
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_io_umbra_NativeThemeBridge_deleteEventHandler(
    _env: JNIEnv<'_>,
    _class: JClass<'_>,
    handle: jlong,
) {
    // Take the entry out before destroying so a callback deleting its own
    // handle never waits on the table lock.
    let entry = HANDLES.lock().remove(handle);
    match entry {
        Some(subscription) => bridge().destroy(subscription),
        None => tracing::debug!(target: targets::HOST, handle, "ignoring unknown event handler"),
    }
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_io_umbra_NativeThemeBridge_getInstalledThemes(
    mut env: JNIEnv<'_>,
    _class: JClass<'_>,
) -> jobject {
    match installed_themes(&mut env) {
        Ok(list) => list.into_raw(),
        Err(err) => {
            tracing::warn!(target: targets::HOST, error = %err, "could not build theme list");
            JObject::null().into_raw()
        }
    }
}

fn installed_themes<'local>(env: &mut JNIEnv<'local>) -> jni::errors::Result<JObject<'local>> {
    let themes = umbra::themes::list_installed_themes();
    let capacity = jint::try_from(themes.len()).unwrap_or(jint::MAX);
    let list = env.new_object("java/util/ArrayList", "(I)V", &[JValue::Int(capacity)])?;
    for theme in &themes {
        let name = env.new_string(theme)?;
        env.call_method(
            &list,
            "add",
            "(Ljava/lang/Object;)Z",
            &[JValue::Object(&name)],
        )?;
        env.delete_local_ref(name)?;
    }
    Ok(list)
}
