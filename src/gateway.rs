use crate::codec::{self, CodecError, MSGPACK_CONTENT_TYPE};
use crate::model::TranscriptionResult;

// ── Error ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum GatewayPostError {
    /// The result record failed to encode.
    Encode(CodecError),
    /// The request never produced a response.
    Transport(String),
    /// The gateway answered with a non-2xx status.
    Status { status: u16, body: String },
}

impl std::fmt::Display for GatewayPostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(e) => write!(f, "result encoding failed: {e}"),
            Self::Transport(msg) => write!(f, "gateway request failed: {msg}"),
            Self::Status { status, body } => write!(f, "gateway returned {status}: {body}"),
        }
    }
}

impl std::error::Error for GatewayPostError {}

// ── Client ─────────────────────────────────────────────────────────────────────

/// Authenticated client for the gateway's results endpoint.
///
/// Cloning shares the underlying `reqwest` connection pool.
#[derive(Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl GatewayClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Post one transcription result to `{base_url}/results`.
    ///
    /// The body is the msgpack-encoded [`TranscriptionResult`]; auth is a
    /// bearer token. Any non-2xx status (with the response body attached) or
    /// transport error is a [`GatewayPostError`]. No retry happens here —
    /// the consumer decides the fate of the queue message from the outcome.
    pub async fn post_result(
        &self,
        request_id: &str,
        transcription: &str,
    ) -> Result<(), GatewayPostError> {
        let result = TranscriptionResult::new(request_id, transcription);
        let payload = codec::encode_result(&result).map_err(GatewayPostError::Encode)?;

        let response = self
            .client
            .post(format!("{}/results", self.base_url))
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, MSGPACK_CONTENT_TYPE)
            .body(payload)
            .send()
            .await
            .map_err(|e| GatewayPostError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayPostError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(request_id, chars = transcription.len(), "result delivered");

        Ok(())
    }
}
