use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::audio::AudioError;
use crate::codec;
use crate::gateway::{GatewayClient, GatewayPostError};
use crate::messaging::{HandlerError, MessageHandler};
use crate::transcriber::{Transcribe, TranscribeError};

/// The production message handler: decode → transcribe → post result.
///
/// Acknowledgment and file cleanup stay with the consumer; this handler only
/// reports success (with the audio path to remove after the ack) or a
/// classified failure.
pub struct TranscribeHandler {
    transcriber: Arc<dyn Transcribe>,
    gateway: GatewayClient,
}

impl TranscribeHandler {
    pub fn new(transcriber: Arc<dyn Transcribe>, gateway: GatewayClient) -> Self {
        Self {
            transcriber,
            gateway,
        }
    }
}

#[async_trait]
impl MessageHandler for TranscribeHandler {
    async fn handle(&self, body: &[u8]) -> Result<Option<PathBuf>, HandlerError> {
        // Decode failures are poison: the same bytes will fail on every
        // redelivery.
        let request = codec::decode_request(body)
            .map_err(|e| HandlerError::Deterministic(e.to_string()))?;

        tracing::info!(
            request_id = %request.request_id,
            fp = %request.fp,
            "▶️  transcription job"
        );

        let fp = PathBuf::from(&request.fp);

        // The transcription call is CPU-bound and can run for minutes;
        // bridging through spawn_blocking keeps the async executor free for
        // the broker heartbeat while this job occupies the process's single
        // worker slot.
        let transcriber = Arc::clone(&self.transcriber);
        let job_path = fp.clone();

        let text = tokio::task::spawn_blocking(move || transcriber.transcribe_to_string(&job_path))
            .await
            .map_err(|e| HandlerError::Transient(format!("transcription task panicked: {e}")))?
            .map_err(classify_transcribe_error)?;

        // The result must reach the gateway before the delivery can be
        // acked; a failure here leaves the message for the retry path and
        // the audio file untouched.
        self.gateway
            .post_result(&request.request_id, &text)
            .await
            .map_err(classify_gateway_error)?;

        tracing::info!(
            request_id = %request.request_id,
            chars = text.len(),
            "✅ job done"
        );

        Ok(Some(fp))
    }
}

// ── Failure classification ─────────────────────────────────────────────────────

fn classify_transcribe_error(e: TranscribeError) -> HandlerError {
    match e {
        // The file's duration and existence do not change across
        // redeliveries.
        TranscribeError::AudioTooLong { .. } => HandlerError::Deterministic(e.to_string()),
        TranscribeError::Audio(AudioError::FileNotFound(_) | AudioError::Open(_)) => {
            HandlerError::Deterministic(e.to_string())
        }
        // Decode and inference failures may be environmental (memory
        // pressure, partial file still being written); give them a retry.
        TranscribeError::Audio(AudioError::Decode(_)) | TranscribeError::Engine(_) => {
            HandlerError::Transient(e.to_string())
        }
    }
}

fn classify_gateway_error(e: GatewayPostError) -> HandlerError {
    match e {
        GatewayPostError::Encode(_) => HandlerError::Deterministic(e.to_string()),
        GatewayPostError::Transport(_) | GatewayPostError::Status { .. } => {
            HandlerError::Transient(e.to_string())
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    struct FixedTranscriber(Result<String, fn() -> TranscribeError>);

    impl Transcribe for FixedTranscriber {
        fn transcribe_to_string(&self, _fp: &Path) -> Result<String, TranscribeError> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn gateway(base_url: &str) -> GatewayClient {
        GatewayClient::new(reqwest::Client::new(), base_url, "test-token")
    }

    #[tokio::test]
    async fn malformed_body_is_deterministic() {
        let handler = TranscribeHandler::new(
            Arc::new(FixedTranscriber(Ok(String::new()))),
            gateway("http://127.0.0.1:1"),
        );

        let err = handler.handle(b"not msgpack").await.unwrap_err();
        assert!(matches!(err, HandlerError::Deterministic(_)));
    }

    #[tokio::test]
    async fn audio_too_long_is_deterministic() {
        let handler = TranscribeHandler::new(
            Arc::new(FixedTranscriber(Err(|| TranscribeError::AudioTooLong {
                duration_secs: 100.0,
                limit_secs: 10.0,
            }))),
            gateway("http://127.0.0.1:1"),
        );

        let body = codec::encode_request(&crate::model::TranscriptionRequest {
            request_id: "r1".into(),
            fp: "/tmp/long.wav".into(),
        })
        .unwrap();

        let err = handler.handle(&body).await.unwrap_err();
        assert!(matches!(err, HandlerError::Deterministic(_)));
    }
}
