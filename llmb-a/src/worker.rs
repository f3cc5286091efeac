//! Completion worker.
//!
//! One detached thread per request drives the engine through
//! configure → generate → finalize and pushes every token event through the
//! sink before asking for the next one. The control thread never blocks on
//! the worker; it only signals the session's interrupt flag or destroys the
//! handle (teardown then waits on the worker's session reference).

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use common::{CompletionRequest, TokenEvent};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::callback::TokenSink;
use crate::engine::{CompletionEngine, EngineError};
use crate::registry::Session;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("invalid completion request: {0}")]
    BadRequest(#[from] serde_json::Error),
    #[error("another completion is already running on this context")]
    AlreadyRunning,
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("failed to spawn completion worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Start a completion on a detached worker thread and return immediately.
/// All results, including failures after this point, reach the caller only
/// through the sink.
pub fn spawn_completion<E, S>(
    session: Arc<Session<E>>,
    raw_request: String,
    sink: S,
) -> Result<(), CompletionError>
where
    E: CompletionEngine + 'static,
    S: TokenSink,
{
    thread::Builder::new()
        .name("llmb-completion".to_string())
        .spawn(move || run_completion(&session, &raw_request, &sink))?;
    Ok(())
}

/// Run one completion to its end on the current thread.
///
/// Never panics outward and never returns an error: request-level failures
/// are logged and reported as a single terminal event with the `error`
/// field set. The sink is released exactly once, when this returns.
pub fn run_completion<E: CompletionEngine>(
    session: &Session<E>,
    raw_request: &str,
    sink: &dyn TokenSink,
) {
    if !session.try_begin() {
        let err = CompletionError::AlreadyRunning;
        warn!("completion rejected: {err}");
        sink.deliver(&TokenEvent::failure(err.to_string()).to_json());
        return;
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| drive(session, raw_request, sink)));
    match outcome {
        Ok(Ok(())) => debug!("completion worker finished"),
        Ok(Err(err)) => {
            warn!("completion failed: {err}");
            sink.deliver(&TokenEvent::failure(err.to_string()).to_json());
        }
        Err(_) => error!("completion worker panicked; releasing callback target"),
    }

    session.finish();
}

fn drive<E: CompletionEngine>(
    session: &Session<E>,
    raw_request: &str,
    sink: &dyn TokenSink,
) -> Result<(), CompletionError> {
    // Configuring
    let request = CompletionRequest::from_json(raw_request)?;
    let mut engine = session.engine();
    engine.rewind();
    engine.init_sampling(&request)?;
    engine.ingest_prompt(&request.prompt)?;
    if engine.context_full() {
        return Err(EngineError::ContextFull.into());
    }

    // Generating; finalization runs on every exit from the loop, interrupt
    // and step errors included
    engine.begin_completion();
    let generated = generate(&mut *engine, session, sink);
    engine.end_completion();
    generated
}

fn generate<E: CompletionEngine>(
    engine: &mut E,
    session: &Session<E>,
    sink: &dyn TokenSink,
) -> Result<(), CompletionError> {
    while engine.has_next_token() {
        if session.interrupted() {
            debug!("completion interrupted");
            break;
        }

        let step = engine.next_token()?;
        let stop = !engine.has_next_token() || step.stopped_word;
        let stopped_word = step.stopped_word;
        sink.deliver(&TokenEvent::token(step.piece, stop).to_json());

        if stopped_word {
            break;
        }
    }
    Ok(())
}
