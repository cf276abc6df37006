use std::path::Path;

use crate::audio::{self, AudioError};
use crate::whisper::{EngineError, WhisperEngine};

// ── Error ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum TranscribeError {
    /// Reported audio duration exceeds the configured ceiling. Raised from
    /// the header probe alone; no samples are decoded and no inference runs.
    AudioTooLong { duration_secs: f64, limit_secs: f64 },
    /// The audio file is missing or unreadable.
    Audio(AudioError),
    /// whisper.cpp inference failed.
    Engine(EngineError),
}

impl std::fmt::Display for TranscribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AudioTooLong {
                duration_secs,
                limit_secs,
            } => write!(
                f,
                "audio duration ({duration_secs:.2}s) exceeds maximum allowed duration ({limit_secs:.2}s)",
            ),
            Self::Audio(e) => write!(f, "{e}"),
            Self::Engine(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for TranscribeError {}

impl From<AudioError> for TranscribeError {
    fn from(e: AudioError) -> Self {
        Self::Audio(e)
    }
}

impl From<EngineError> for TranscribeError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

// ── Capability ─────────────────────────────────────────────────────────────────

/// The speech-to-text capability: audio file path in, transcript out.
///
/// The per-message handler depends on this trait rather than on the whisper
/// stack directly, so tests can substitute a stub.
pub trait Transcribe: Send + Sync {
    fn transcribe_to_string(&self, fp: &Path) -> Result<String, TranscribeError>;
}

/// Production implementation backed by a shared [`WhisperEngine`].
pub struct Transcriber {
    engine: WhisperEngine,
    beam_size: i32,
    n_threads: i32,
    max_duration_secs: f64,
}

impl Transcriber {
    pub fn new(
        engine: WhisperEngine,
        beam_size: i32,
        n_threads: i32,
        max_duration_secs: f64,
    ) -> Self {
        Self {
            engine,
            beam_size,
            n_threads,
            max_duration_secs,
        }
    }
}

impl Transcribe for Transcriber {
    /// Transcribe the audio file at `fp` to a single string.
    ///
    /// The duration ceiling is checked against the WAV header before any
    /// sample data or inference resources are touched; an over-limit file
    /// fails with [`TranscribeError::AudioTooLong`] having consumed nothing
    /// but one header read.
    ///
    /// This call is CPU-bound and long-running; the caller is expected to
    /// run it inside `tokio::task::spawn_blocking`.
    fn transcribe_to_string(&self, fp: &Path) -> Result<String, TranscribeError> {
        let duration_secs = audio::probe_duration(fp)?;

        if duration_secs > self.max_duration_secs {
            return Err(TranscribeError::AudioTooLong {
                duration_secs,
                limit_secs: self.max_duration_secs,
            });
        }

        let samples = audio::read_samples(fp)?;
        let text = self
            .engine
            .transcribe(&samples, self.beam_size, self.n_threads)?;

        tracing::debug!(
            path = %fp.display(),
            duration_secs,
            chars = text.len(),
            "transcription finished"
        );

        Ok(text)
    }
}
