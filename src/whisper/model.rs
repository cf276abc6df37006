use std::path::Path;

use whisper_rs::{WhisperContext, WhisperContextParameters};

/// A GGML Whisper model loaded into memory.
///
/// Loading reads the full model weights, so it happens once at startup; the
/// loaded model is shared via `Arc<WhisperModel>` and stays resident as long
/// as any clone is alive.
///
/// `WhisperContext` is `Send + Sync`: the weights are immutable after
/// loading, and per-call inference state lives in a `WhisperState` created
/// inside [`super::engine::WhisperEngine::transcribe`].
pub struct WhisperModel {
    pub(super) context: WhisperContext,

    /// Human-readable model identifier (e.g. `"base"`), used in logs.
    pub name: String,
}

// Safety: whisper.cpp contexts are safe to send and share across threads.
// The context owns the model weights and exposes only read operations after
// initialization; mutable state is confined to per-call `WhisperState`.
unsafe impl Send for WhisperModel {}
unsafe impl Sync for WhisperModel {}

/// Errors that can occur while loading the model.
#[derive(Debug)]
pub enum ModelError {
    /// The model file does not exist at the given path.
    FileNotFound(String),
    /// whisper.cpp rejected the model file (wrong format, corrupt, ...).
    Load(String),
    /// The path contains non-UTF-8 characters, which whisper.cpp cannot take.
    InvalidPath(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileNotFound(p) => write!(f, "model file not found: {p}"),
            Self::Load(msg) => write!(f, "failed to load whisper model: {msg}"),
            Self::InvalidPath(p) => write!(f, "model path is not valid UTF-8: {p}"),
        }
    }
}

impl std::error::Error for ModelError {}

impl WhisperModel {
    /// Load a GGML model file from disk.
    ///
    /// `model_name` is the label used in logs (e.g. `"base"`); it does not
    /// need to match the filename.
    pub fn load(model_path: &Path, model_name: String) -> Result<Self, ModelError> {
        if !model_path.exists() {
            return Err(ModelError::FileNotFound(model_path.display().to_string()));
        }

        let path_str = model_path
            .to_str()
            .ok_or_else(|| ModelError::InvalidPath(model_path.display().to_string()))?;

        let started = std::time::Instant::now();

        let context = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| ModelError::Load(e.to_string()))?;

        tracing::debug!(
            model = %model_name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "whisper model loaded"
        );

        Ok(Self {
            context,
            name: model_name,
        })
    }
}
