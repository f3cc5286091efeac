//! Native bridge between a managed mobile runtime and an on-device LLM
//! inference engine.
//!
//! The engine itself (tokenization, decoding, sampling, KV cache) is an
//! external library consumed through a fixed C API; this crate is the glue
//! around it: handle lifetime management, per-request worker threads, JSON
//! marshaling of parameters and token events, and callback delivery back
//! into the managed runtime.
//!
//! Two export surfaces sit on top of the same core, both Android-only:
//! JNI bindings for `com.llmb.a.LlamaBridge` in [`jni_bridge`] and a plain
//! C ABI (`llmb_*`) in [`capi`]. The core ([`registry`], [`worker`],
//! [`callback`], and the [`engine`] trait seam) is portable and tested on
//! the host against a scripted engine.

pub mod callback;
pub mod engine;
pub mod registry;
pub mod worker;

#[cfg(target_os = "android")]
pub mod capi;
#[cfg(target_os = "android")]
pub mod jni_bridge;

pub use registry::{ContextRegistry, Session};

pub const BRIDGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install an env-filtered tracing subscriber for host builds and tests.
///
/// Android builds log through the platform logger installed in
/// `JNI_OnLoad` instead.
#[cfg(not(target_os = "android"))]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
