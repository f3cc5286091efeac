//! C ABI for the bridge (`llmb_*`).
//!
//! This is the flat surface consumed by non-JVM embedders and by the JNI
//! layer, which shares the registry defined here. Handles are the
//! generation-checked values issued by [`ContextRegistry`]; 0 always means
//! failure.

use std::ffi::{c_char, c_int, c_void, CStr, CString};

use common::EngineParams;
use log::{error, warn};
use once_cell::sync::Lazy;

use crate::callback::TokenSink;
use crate::engine::{self, NativeEngine};
use crate::registry::ContextRegistry;
use crate::worker::spawn_completion;

static REGISTRY: Lazy<ContextRegistry<NativeEngine>> = Lazy::new(ContextRegistry::new);

pub(crate) fn registry() -> &'static ContextRegistry<NativeEngine> {
    &REGISTRY
}

/// Token event callback: receives one NUL-terminated JSON event per
/// generated token, on a bridge-owned worker thread, plus the caller's
/// opaque user data pointer.
#[allow(non_camel_case_types)]
pub type llmb_token_callback = extern "C" fn(*const c_char, *mut c_void);

struct CallbackSink {
    on_token: llmb_token_callback,
    user_data: *mut c_void,
}

// user_data is an opaque caller token; the callback contract requires both
// to be usable from the worker thread.
unsafe impl Send for CallbackSink {}

impl TokenSink for CallbackSink {
    fn deliver(&self, payload: &str) {
        match CString::new(payload) {
            Ok(c_payload) => (self.on_token)(c_payload.as_ptr(), self.user_data),
            Err(_) => warn!("token delivery dropped: payload contains NUL"),
        }
    }
}

/// Bridge version string (static storage, do not free).
#[no_mangle]
pub extern "C" fn llmb_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

/// Load a model and return a context handle, or 0 on failure. No partial
/// context survives a failed load.
#[no_mangle]
pub extern "C" fn llmb_load_model(model_path: *const c_char) -> i64 {
    if model_path.is_null() {
        error!("llmb_load_model: model path is null");
        return 0;
    }
    let path = match unsafe { CStr::from_ptr(model_path) }.to_str() {
        Ok(path) => path,
        Err(_) => {
            error!("llmb_load_model: model path is not valid UTF-8");
            return 0;
        }
    };
    if let Err(err) = engine::validate_model_path(path) {
        error!("llmb_load_model: {err}");
        return 0;
    }

    engine::ensure_backend();
    match NativeEngine::load(path, &EngineParams::default()) {
        Ok(engine) => registry().insert(engine),
        Err(err) => {
            error!("llmb_load_model: {err}");
            0
        }
    }
}

/// Destroy a context. No-op on 0 or stale handles. The caller must not use
/// the handle afterwards; a completion still in flight keeps the engine
/// alive until it finishes.
#[no_mangle]
pub extern "C" fn llmb_destroy_context(handle: i64) {
    if handle == 0 {
        return;
    }
    if registry().remove(handle).is_none() {
        warn!("llmb_destroy_context: unknown handle {handle:#x}");
    }
}

/// Start a completion. Returns 0 on accepted start, negative on argument
/// errors. Results are delivered only through `on_token`; the stream ends
/// with an event carrying `"stop":true` or ceases silently on interrupt.
#[no_mangle]
pub extern "C" fn llmb_completion(
    handle: i64,
    request_json: *const c_char,
    on_token: Option<llmb_token_callback>,
    user_data: *mut c_void,
) -> c_int {
    let Some(session) = registry().get(handle) else {
        error!("llmb_completion: unknown handle {handle:#x}");
        return -1;
    };
    if request_json.is_null() {
        error!("llmb_completion: request is null");
        return -1;
    }
    let Some(on_token) = on_token else {
        error!("llmb_completion: token callback is null");
        return -1;
    };
    let raw = unsafe { CStr::from_ptr(request_json) }
        .to_string_lossy()
        .into_owned();

    let sink = CallbackSink {
        on_token,
        user_data,
    };
    match spawn_completion(session, raw, sink) {
        Ok(()) => 0,
        Err(err) => {
            error!("llmb_completion: {err}");
            -2
        }
    }
}

/// Request early termination of the active completion on this handle.
/// Safe from any thread, idempotent, no-op without an active completion.
#[no_mangle]
pub extern "C" fn llmb_interrupt(handle: i64) {
    if let Some(session) = registry().get(handle) {
        session.interrupt();
    }
}
