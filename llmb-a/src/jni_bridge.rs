//! JNI bindings for local LLM inference.
//!
//! Package: com.llmb.a.LlamaBridge
//!
//! Thin wrappers over the registry/worker core: marshal Java strings in,
//! pin the listener with a global reference, and hand everything to a
//! detached completion worker. Token delivery attaches the worker thread to
//! the VM for exactly the duration of each callback.

use std::ffi::c_void;

use jni::objects::{GlobalRef, JClass, JObject, JString, JValue};
use jni::sys::{jint, jlong, JNI_VERSION_1_6};
use jni::{JNIEnv, JavaVM};
use log::{debug, error, info, warn};

use common::EngineParams;

use crate::callback::TokenSink;
use crate::capi::registry;
use crate::engine::{self, NativeEngine};
use crate::worker::spawn_completion;
use crate::BRIDGE_VERSION;

const ON_TOKEN_METHOD: &str = "onTokenReceived";
const ON_TOKEN_SIG: &str = "(Ljava/lang/String;)V";

#[no_mangle]
pub extern "system" fn JNI_OnLoad(_vm: *mut jni::sys::JavaVM, _reserved: *mut c_void) -> jint {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Debug)
            .with_tag("llmb"),
    );
    info!("JNI_OnLoad: bridge {BRIDGE_VERSION} ready");
    JNI_VERSION_1_6
}

/// Listener reference pinned for the lifetime of one completion worker.
///
/// The VM is captured from the issuing call's env, so the sink is
/// self-contained; no process-global VM pointer exists. Dropping the sink
/// releases the global reference exactly once.
struct JniTokenSink {
    vm: JavaVM,
    target: GlobalRef,
}

impl TokenSink for JniTokenSink {
    fn deliver(&self, payload: &str) {
        // Scoped attach: the guard detaches on drop, on every exit path,
        // once per attach
        let mut env = match self.vm.attach_current_thread() {
            Ok(env) => env,
            Err(err) => {
                error!("token delivery dropped: thread attach failed: {err}");
                return;
            }
        };

        let java_payload = match env.new_string(payload) {
            Ok(java_payload) => java_payload,
            Err(err) => {
                error!("token delivery dropped: string construction failed: {err}");
                return;
            }
        };

        let called = env.call_method(
            self.target.as_obj(),
            ON_TOKEN_METHOD,
            ON_TOKEN_SIG,
            &[JValue::Object(&java_payload)],
        );
        if let Err(err) = called {
            warn!("token delivery dropped: listener invocation failed: {err}");
            if env.exception_check().unwrap_or(false) {
                let _ = env.exception_clear();
            }
        }
    }
}

/// Load a model and create its engine context.
///
/// Java signature:
/// private static native long nativeLoadModel(String modelPath);
///
/// Returns: context handle, or 0 on failure
#[no_mangle]
pub extern "C" fn Java_com_llmb_a_LlamaBridge_nativeLoadModel(
    mut env: JNIEnv,
    _class: JClass,
    model_path: JString,
) -> jlong {
    if model_path.is_null() {
        error!("nativeLoadModel: model path is null");
        return 0;
    }
    let path: String = match env.get_string(&model_path) {
        Ok(path) => path.into(),
        Err(err) => {
            error!("nativeLoadModel: could not read model path: {err}");
            return 0;
        }
    };
    if let Err(err) = engine::validate_model_path(&path) {
        error!("nativeLoadModel: {err}");
        return 0;
    }

    engine::ensure_backend();
    match NativeEngine::load(&path, &EngineParams::default()) {
        Ok(engine) => {
            let handle = registry().insert(engine);
            info!("nativeLoadModel: context ready, handle {handle:#x}");
            handle
        }
        Err(err) => {
            error!("nativeLoadModel: {err}");
            0
        }
    }
}

/// Destroy a context and release its engine resources. The caller must not
/// issue further calls on the handle; an in-flight completion keeps the
/// engine alive until it finishes.
///
/// Java signature:
/// private static native void nativeDestroyContext(long contextPtr);
#[no_mangle]
pub extern "C" fn Java_com_llmb_a_LlamaBridge_nativeDestroyContext(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) {
    if handle == 0 {
        return;
    }
    if registry().remove(handle).is_none() {
        warn!("nativeDestroyContext: unknown handle {handle:#x}");
    }
}

/// Start an asynchronous completion; returns immediately. Every generated
/// token reaches the callback as one JSON event on a worker-owned thread,
/// ending with `"stop":true` or ceasing silently on interrupt.
///
/// Java signature:
/// private static native void nativeCompletion(long contextPtr, String completionParamsJson, CompletionCallback callback);
#[no_mangle]
pub extern "C" fn Java_com_llmb_a_LlamaBridge_nativeCompletion(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
    request_json: JString,
    callback: JObject,
) {
    if request_json.is_null() || callback.is_null() {
        error!("nativeCompletion: request or callback is null");
        return;
    }
    let Some(session) = registry().get(handle) else {
        error!("nativeCompletion: unknown handle {handle:#x}");
        return;
    };

    let raw: String = match env.get_string(&request_json) {
        Ok(raw) => raw.into(),
        Err(err) => {
            error!("nativeCompletion: could not read request: {err}");
            return;
        }
    };
    let target = match env.new_global_ref(&callback) {
        Ok(target) => target,
        Err(err) => {
            error!("nativeCompletion: could not pin callback: {err}");
            return;
        }
    };
    let vm = match env.get_java_vm() {
        Ok(vm) => vm,
        Err(err) => {
            error!("nativeCompletion: could not capture VM: {err}");
            return;
        }
    };

    debug!("nativeCompletion: spawning worker for handle {handle:#x}");
    if let Err(err) = spawn_completion(session, raw, JniTokenSink { vm, target }) {
        error!("nativeCompletion: {err}");
    }
}

/// Request early termination of the active completion. Safe from any
/// thread, idempotent, no-op when nothing is running.
///
/// Java signature:
/// private static native void nativeInterrupt(long contextPtr);
#[no_mangle]
pub extern "C" fn Java_com_llmb_a_LlamaBridge_nativeInterrupt(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) {
    if let Some(session) = registry().get(handle) {
        session.interrupt();
    }
}
