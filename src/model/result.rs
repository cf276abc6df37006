use serde::{Deserialize, Serialize};

/// Transcription result posted to the gateway's `/results` endpoint.
///
/// Exactly one result is posted per successfully processed request, and the
/// post happens before the queue delivery is acknowledged. The record is not
/// persisted locally.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TranscriptionResult {
    /// Same value received in the request (correlation key).
    pub request_id: String,

    /// Transcribed text. Empty when the audio contained no speech.
    pub transcription: String,
}

impl TranscriptionResult {
    pub fn new(request_id: impl Into<String>, transcription: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            transcription: transcription.into(),
        }
    }
}
