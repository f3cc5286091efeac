//! The fixed API of the external inference engine.
//!
//! Everything behind [`CompletionEngine`] is owned by the engine library:
//! prompt ingestion, the forward pass, sampling, stop-word matching. The
//! bridge only drives the calls in order and never reaches past this seam.

use std::path::Path;
use std::sync::Once;

use common::CompletionRequest;
use thiserror::Error;

#[cfg(target_os = "android")]
pub mod native;
#[cfg(target_os = "android")]
pub use native::NativeEngine;

#[cfg(test)]
pub mod mock;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("model load failed: {0}")]
    ModelLoad(String),
    #[error("sampling initialization failed")]
    SamplingInit,
    #[error("prompt ingestion failed: {0}")]
    PromptIngestion(String),
    #[error("context window is full")]
    ContextFull,
    #[error("generation step failed (engine status {0})")]
    Step(i32),
}

/// One generation step: the displayable text for the sampled token and
/// whether it matched a configured stop word.
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub piece: String,
    pub stopped_word: bool,
}

/// Stepwise completion interface of the engine context.
///
/// One context serves one completion at a time; the caller sequences
/// `rewind` → `init_sampling` → `ingest_prompt` → `begin_completion` →
/// (`has_next_token` / `next_token`)* → `end_completion`. `end_completion`
/// must run whenever `begin_completion` ran, including after early exits.
pub trait CompletionEngine: Send {
    /// Reset per-request generation state left by a previous completion.
    fn rewind(&mut self);

    /// Apply the request's sampling parameters and stop words.
    fn init_sampling(&mut self, request: &CompletionRequest) -> Result<(), EngineError>;

    /// Feed the prompt through the engine.
    fn ingest_prompt(&mut self, prompt: &str) -> Result<(), EngineError>;

    /// True when prompt ingestion exhausted the context window.
    fn context_full(&self) -> bool;

    fn begin_completion(&mut self);

    fn has_next_token(&self) -> bool;

    fn next_token(&mut self) -> Result<StepOutput, EngineError>;

    /// End-of-completion bookkeeping; releases per-request engine state.
    fn end_completion(&mut self);
}

static BACKEND_INIT: Once = Once::new();

/// Initialize the engine's process-wide compute backend, once, lazily.
/// Must run before the first model load.
pub fn ensure_backend() {
    BACKEND_INIT.call_once(|| {
        #[cfg(target_os = "android")]
        native::backend_init();
        tracing::debug!("inference backend initialized");
    });
}

/// Preflight a model path before handing it to the engine loader.
pub fn validate_model_path(path: &str) -> Result<&Path, EngineError> {
    if path.is_empty() {
        return Err(EngineError::ModelLoad("empty model path".to_string()));
    }
    let path_ref = Path::new(path);
    if !path_ref.is_file() {
        return Err(EngineError::ModelLoad(format!(
            "model file does not exist: {path}"
        )));
    }
    Ok(path_ref)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_backend_is_idempotent() {
        ensure_backend();
        ensure_backend();
    }

    #[test]
    fn empty_model_path_is_rejected() {
        assert!(matches!(
            validate_model_path(""),
            Err(EngineError::ModelLoad(_))
        ));
    }

    #[test]
    fn missing_model_file_is_rejected() {
        let err = validate_model_path("/nonexistent/model.gguf").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn existing_model_file_passes_validation() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        assert!(validate_model_path(path).is_ok());
    }
}
