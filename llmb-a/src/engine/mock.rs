//! Scripted engine for host-side tests.

use common::CompletionRequest;

use super::{CompletionEngine, EngineError, StepOutput};

#[derive(Default)]
pub struct ScriptedEngine {
    script: Vec<StepOutput>,
    cursor: usize,
    pub calls: Vec<&'static str>,
    pub last_request: Option<CompletionRequest>,
    pub last_prompt: Option<String>,
    pub context_full: bool,
    pub fail_sampling: bool,
    pub fail_step_at: Option<usize>,
    pub panic_on_step: bool,
}

impl ScriptedEngine {
    pub fn with_pieces(pieces: &[&str]) -> Self {
        Self {
            script: pieces
                .iter()
                .map(|piece| StepOutput {
                    piece: (*piece).to_string(),
                    stopped_word: false,
                })
                .collect(),
            ..Self::default()
        }
    }

    /// Mark the token at `index` as a stop-word match.
    pub fn stop_word_at(mut self, index: usize) -> Self {
        self.script[index].stopped_word = true;
        self
    }

    pub fn steps_taken(&self) -> usize {
        self.cursor
    }
}

impl CompletionEngine for ScriptedEngine {
    fn rewind(&mut self) {
        self.cursor = 0;
        self.calls.push("rewind");
    }

    fn init_sampling(&mut self, request: &CompletionRequest) -> Result<(), EngineError> {
        self.calls.push("init_sampling");
        if self.fail_sampling {
            return Err(EngineError::SamplingInit);
        }
        self.last_request = Some(request.clone());
        Ok(())
    }

    fn ingest_prompt(&mut self, prompt: &str) -> Result<(), EngineError> {
        self.calls.push("ingest_prompt");
        self.last_prompt = Some(prompt.to_string());
        Ok(())
    }

    fn context_full(&self) -> bool {
        self.context_full
    }

    fn begin_completion(&mut self) {
        self.calls.push("begin_completion");
    }

    fn has_next_token(&self) -> bool {
        self.cursor < self.script.len()
    }

    fn next_token(&mut self) -> Result<StepOutput, EngineError> {
        if self.panic_on_step {
            panic!("scripted engine panic");
        }
        if self.fail_step_at == Some(self.cursor) {
            return Err(EngineError::Step(-3));
        }
        let step = self.script[self.cursor].clone();
        self.cursor += 1;
        Ok(step)
    }

    fn end_completion(&mut self) {
        self.calls.push("end_completion");
    }
}
