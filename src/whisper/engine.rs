use std::sync::Arc;

use whisper_rs::{FullParams, SamplingStrategy};

use super::model::WhisperModel;

/// Errors that can occur during inference.
#[derive(Debug)]
pub enum EngineError {
    /// Failed to allocate a `WhisperState` from the context.
    StateCreation(String),
    /// `state.full()` returned an error.
    Inference(String),
    /// Reading a segment from the completed state failed.
    SegmentRead(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StateCreation(msg) => write!(f, "whisper state creation failed: {msg}"),
            Self::Inference(msg) => write!(f, "whisper inference failed: {msg}"),
            Self::SegmentRead(msg) => write!(f, "segment read failed: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

/// Wraps a shared [`WhisperModel`] and exposes `transcribe()`.
///
/// Cloning is an `Arc` increment; the model is never reloaded. Each call
/// allocates its own `WhisperState`, so concurrent calls on the same engine
/// are safe, though this worker issues one at a time by construction.
#[derive(Clone)]
pub struct WhisperEngine {
    model: Arc<WhisperModel>,
}

impl WhisperEngine {
    pub fn new(model: Arc<WhisperModel>) -> Self {
        Self { model }
    }

    /// Name of the underlying model (e.g. `"base"`).
    pub fn model_name(&self) -> &str {
        &self.model.name
    }

    /// Transcribe mono 16 kHz f32 PCM samples to text.
    ///
    /// Beam-search decoding with the given `beam_size`; `n_threads = 0`
    /// keeps the library's own thread-count default. Language is
    /// auto-detected.
    ///
    /// Segment texts are concatenated in model-native order with no added
    /// separators — whisper.cpp segments carry their own leading spacing.
    pub fn transcribe(
        &self,
        samples: &[f32],
        beam_size: i32,
        n_threads: i32,
    ) -> Result<String, EngineError> {
        // Per-call inference state; does not touch the model weights.
        let mut state = self
            .model
            .context
            .create_state()
            .map_err(|e| EngineError::StateCreation(e.to_string()))?;

        let mut params = FullParams::new(SamplingStrategy::BeamSearch {
            beam_size,
            patience: -1.0,
        });

        params.set_language(None);

        if n_threads > 0 {
            params.set_n_threads(n_threads);
        }

        // Observability goes through `tracing`; silence whisper.cpp's own
        // stdout chatter.
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        tracing::debug!(
            model = self.model_name(),
            beam_size,
            samples = samples.len(),
            "starting inference"
        );

        let started = std::time::Instant::now();

        state
            .full(params, samples)
            .map_err(|e| EngineError::Inference(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| EngineError::SegmentRead(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| EngineError::SegmentRead(format!("segment {i}: {e}")))?;
            text.push_str(&segment);
        }

        tracing::debug!(
            model = self.model_name(),
            segments = n_segments,
            chars = text.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "inference complete"
        );

        Ok(text)
    }
}
