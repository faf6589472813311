//! Delivery of change notifications to a `java.lang.Runnable`.

use jni::errors::Error as JniError;
use jni::objects::{GlobalRef, JObject};
use jni::{AttachGuard, JNIEnv, JavaVM};
use umbra::logging::targets;
use umbra::{BridgeError, DeliveryError, HostCallback};

const RUN_METHOD: &str = "run";
const RUN_SIGNATURE: &str = "()V";

/// The calling thread's JVM attachment for the duration of one delivery.
///
/// A thread that is already attached is used as is; otherwise it is attached
/// now and detached again when the guard drops.
enum ThreadAttachment<'vm> {
    Existing(JNIEnv<'vm>),
    Scoped(AttachGuard<'vm>),
}

impl<'vm> ThreadAttachment<'vm> {
    fn acquire(vm: &'vm JavaVM) -> jni::errors::Result<Self> {
        match vm.get_env() {
            Ok(env) => Ok(Self::Existing(env)),
            Err(_) => vm.attach_current_thread().map(Self::Scoped),
        }
    }

    fn env(&mut self) -> &mut JNIEnv<'vm> {
        match self {
            Self::Existing(env) => env,
            Self::Scoped(guard) => &mut **guard,
        }
    }
}

/// A global reference to a `Runnable`, invoked once per change.
pub struct JniCallback {
    vm: JavaVM,
    runnable: GlobalRef,
}

impl JniCallback {
    /// Pin `runnable` with a global reference for the subscription's lifetime.
    pub fn new(env: &mut JNIEnv<'_>, runnable: &JObject<'_>) -> Result<Self, BridgeError> {
        if runnable.is_null() {
            return Err(BridgeError::callback("runnable is null"));
        }
        let vm = env
            .get_java_vm()
            .map_err(|e| BridgeError::callback(format!("GetJavaVM failed: {e}")))?;
        let runnable = env
            .new_global_ref(runnable)
            .map_err(|e| BridgeError::callback(format!("NewGlobalRef failed: {e}")))?;
        Ok(Self { vm, runnable })
    }
}

impl HostCallback for JniCallback {
    fn invoke(&mut self) -> Result<(), DeliveryError> {
        let mut attachment = ThreadAttachment::acquire(&self.vm)
            .map_err(|e| DeliveryError::failed(format!("could not attach to the JVM: {e}")))?;
        let env = attachment.env();

        match env.call_method(&self.runnable, RUN_METHOD, RUN_SIGNATURE, &[]) {
            Ok(_) => Ok(()),
            Err(JniError::MethodNotFound { name, sig }) => {
                clear_exception(env);
                Err(DeliveryError::unresolved(format!("{name}{sig}")))
            }
            Err(JniError::JavaException) => {
                if env.exception_check().unwrap_or(false) {
                    let _ = env.exception_describe();
                }
                clear_exception(env);
                Err(DeliveryError::failed("Runnable.run threw an exception"))
            }
            Err(err) => {
                clear_exception(env);
                Err(DeliveryError::failed(err.to_string()))
            }
        }
    }
}

fn clear_exception(env: &mut JNIEnv<'_>) {
    if env.exception_check().unwrap_or(false) {
        if let Err(err) = env.exception_clear() {
            tracing::warn!(target: targets::HOST, error = %err, "failed to clear pending exception");
        }
    }
}
