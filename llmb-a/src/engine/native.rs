//! FFI wrapper for the lmrt inference engine (Android builds).
//!
//! The engine is linked as a prebuilt static library; `build.rs` stages the
//! archive and system libraries. All engine state lives behind the opaque
//! `lmrt_context` pointer.

use std::ffi::{c_char, c_int, CString};
use std::ptr::NonNull;

use common::{CompletionRequest, EngineParams};
use tracing::{debug, warn};

use super::{CompletionEngine, EngineError, StepOutput};

#[allow(non_camel_case_types)]
pub mod ffi {
    use std::ffi::{c_char, c_int};

    /// Opaque engine context (model weights, KV cache, sampling state).
    #[repr(C)]
    pub struct lmrt_context {
        _private: [u8; 0],
    }

    #[repr(C)]
    pub struct lmrt_params {
        pub n_ctx: u32,
        pub n_batch: u32,
        pub n_threads: c_int,
        pub use_mlock: bool,
        pub n_gpu_layers: u32,
    }

    #[repr(C)]
    pub struct lmrt_sampling {
        pub temperature: f32,
        pub top_k: c_int,
        pub top_p: f32,
        pub repeat_penalty: f32,
        pub n_predict: c_int,
    }

    extern "C" {
        pub fn lmrt_backend_init();
        pub fn lmrt_open(model_path: *const c_char, params: *const lmrt_params)
            -> *mut lmrt_context;
        pub fn lmrt_close(ctx: *mut lmrt_context);
        pub fn lmrt_rewind(ctx: *mut lmrt_context);
        pub fn lmrt_sampling_init(ctx: *mut lmrt_context, sampling: *const lmrt_sampling) -> bool;
        pub fn lmrt_add_stop_word(ctx: *mut lmrt_context, word: *const c_char);
        pub fn lmrt_prompt_ingest(ctx: *mut lmrt_context, prompt: *const c_char) -> c_int;
        pub fn lmrt_context_full(ctx: *const lmrt_context) -> bool;
        pub fn lmrt_begin(ctx: *mut lmrt_context);
        pub fn lmrt_has_next(ctx: *const lmrt_context) -> bool;
        pub fn lmrt_step(
            ctx: *mut lmrt_context,
            piece_buf: *mut c_char,
            piece_cap: c_int,
            stopped_word: *mut bool,
        ) -> c_int;
        pub fn lmrt_end(ctx: *mut lmrt_context);
    }
}

/// Initialize the engine's process-wide backend (compute pool, kernels).
pub(super) fn backend_init() {
    unsafe { ffi::lmrt_backend_init() }
}

/// Owning wrapper around one `lmrt_context`.
pub struct NativeEngine {
    ctx: NonNull<ffi::lmrt_context>,
}

// The context pointer moves to the completion worker thread but is only
// ever used by one thread at a time (session engine cell).
unsafe impl Send for NativeEngine {}

impl NativeEngine {
    /// Open an engine context for the model at `path`. Any failure releases
    /// partial engine state inside the library; no half-open context is
    /// returned.
    pub fn load(path: &str, params: &EngineParams) -> Result<Self, EngineError> {
        let c_path = CString::new(path)
            .map_err(|_| EngineError::ModelLoad("model path contains NUL".to_string()))?;
        let raw = ffi::lmrt_params {
            n_ctx: params.n_ctx,
            n_batch: params.n_batch,
            n_threads: params.n_threads,
            use_mlock: params.use_mlock,
            n_gpu_layers: params.n_gpu_layers,
        };

        debug!(path, n_ctx = params.n_ctx, "opening engine context");
        let ctx = unsafe { ffi::lmrt_open(c_path.as_ptr(), &raw) };
        NonNull::new(ctx)
            .map(|ctx| Self { ctx })
            .ok_or_else(|| EngineError::ModelLoad(path.to_string()))
    }
}

impl CompletionEngine for NativeEngine {
    fn rewind(&mut self) {
        unsafe { ffi::lmrt_rewind(self.ctx.as_ptr()) }
    }

    fn init_sampling(&mut self, request: &CompletionRequest) -> Result<(), EngineError> {
        let sampling = ffi::lmrt_sampling {
            temperature: request.temperature,
            top_k: request.top_k,
            top_p: request.top_p,
            repeat_penalty: request.repeat_penalty,
            n_predict: request.n_predict,
        };
        if !unsafe { ffi::lmrt_sampling_init(self.ctx.as_ptr(), &sampling) } {
            return Err(EngineError::SamplingInit);
        }
        for word in &request.stop {
            match CString::new(word.as_str()) {
                Ok(c_word) => unsafe { ffi::lmrt_add_stop_word(self.ctx.as_ptr(), c_word.as_ptr()) },
                Err(_) => warn!(%word, "stop word skipped: contains NUL"),
            }
        }
        Ok(())
    }

    fn ingest_prompt(&mut self, prompt: &str) -> Result<(), EngineError> {
        let c_prompt = CString::new(prompt)
            .map_err(|_| EngineError::PromptIngestion("prompt contains NUL".to_string()))?;
        let status = unsafe { ffi::lmrt_prompt_ingest(self.ctx.as_ptr(), c_prompt.as_ptr()) };
        if status != 0 {
            return Err(EngineError::PromptIngestion(format!(
                "engine status {status}"
            )));
        }
        Ok(())
    }

    fn context_full(&self) -> bool {
        unsafe { ffi::lmrt_context_full(self.ctx.as_ptr()) }
    }

    fn begin_completion(&mut self) {
        unsafe { ffi::lmrt_begin(self.ctx.as_ptr()) }
    }

    fn has_next_token(&self) -> bool {
        unsafe { ffi::lmrt_has_next(self.ctx.as_ptr()) }
    }

    fn next_token(&mut self) -> Result<StepOutput, EngineError> {
        let mut piece_buf = [0u8; 256];
        let mut stopped_word = false;
        let len = unsafe {
            ffi::lmrt_step(
                self.ctx.as_ptr(),
                piece_buf.as_mut_ptr() as *mut c_char,
                piece_buf.len() as c_int,
                &mut stopped_word,
            )
        };
        if len < 0 {
            return Err(EngineError::Step(len));
        }
        let piece = String::from_utf8_lossy(&piece_buf[..len as usize]).into_owned();
        Ok(StepOutput {
            piece,
            stopped_word,
        })
    }

    fn end_completion(&mut self) {
        unsafe { ffi::lmrt_end(self.ctx.as_ptr()) }
    }
}

impl Drop for NativeEngine {
    fn drop(&mut self) {
        debug!("closing engine context");
        unsafe { ffi::lmrt_close(self.ctx.as_ptr()) }
    }
}
