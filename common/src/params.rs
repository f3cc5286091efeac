//! Engine runtime configuration.

use serde::{Deserialize, Serialize};

/// Parameters applied when opening an engine context for a model file.
///
/// Defaults match the bridge's production configuration: a 2048-token
/// window, CPU-only decoding with one thread per available core, and the
/// model weights locked in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineParams {
    /// Context window size in tokens.
    pub n_ctx: u32,
    /// Batch size for prompt ingestion.
    pub n_batch: u32,
    /// Worker threads for the engine's own compute.
    pub n_threads: i32,
    /// Lock model pages in memory.
    pub use_mlock: bool,
    /// Layers offloaded to the GPU; 0 keeps everything on the CPU.
    pub n_gpu_layers: u32,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            n_ctx: 2048,
            n_batch: 512,
            n_threads: detected_thread_count(),
            use_mlock: true,
            n_gpu_layers: 0,
        }
    }
}

/// Available hardware concurrency, falling back to 4 when undetectable.
pub fn detected_thread_count() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as i32)
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_configuration() {
        let params = EngineParams::default();
        assert_eq!(params.n_ctx, 2048);
        assert_eq!(params.n_batch, 512);
        assert!(params.n_threads >= 1);
        assert!(params.use_mlock);
        assert_eq!(params.n_gpu_layers, 0);
    }
}
