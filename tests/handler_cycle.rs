//! End-to-end processing-cycle properties, driven through the per-message
//! handler with a stubbed transcription capability and a mock gateway.
//!
//! The ordering contract under test: the gateway receives the result before
//! anything is acknowledged or deleted, and a failure at any earlier stage
//! leaves the local audio file in place.

use std::path::Path;
use std::sync::Arc;

use wiremock::matchers::{method, path as url_path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use litescribe_worker::codec;
use litescribe_worker::gateway::GatewayClient;
use litescribe_worker::messaging::{remove_audio_file, HandlerError, MessageHandler};
use litescribe_worker::model::TranscriptionRequest;
use litescribe_worker::transcriber::{Transcribe, TranscribeError};
use litescribe_worker::worker::TranscribeHandler;

// ── Stub capability ────────────────────────────────────────────────────────────

enum StubBehavior {
    Text(&'static str),
    TooLong,
}

struct StubTranscriber(StubBehavior);

impl Transcribe for StubTranscriber {
    fn transcribe_to_string(&self, _fp: &Path) -> Result<String, TranscribeError> {
        match self.0 {
            StubBehavior::Text(text) => Ok(text.to_string()),
            StubBehavior::TooLong => Err(TranscribeError::AudioTooLong {
                duration_secs: 7200.0,
                limit_secs: 3600.0,
            }),
        }
    }
}

fn handler(behavior: StubBehavior, gateway_url: &str) -> TranscribeHandler {
    TranscribeHandler::new(
        Arc::new(StubTranscriber(behavior)),
        GatewayClient::new(reqwest::Client::new(), gateway_url, "test-token"),
    )
}

fn encoded_request(request_id: &str, fp: &Path) -> Vec<u8> {
    codec::encode_request(&TranscriptionRequest {
        request_id: request_id.to_string(),
        fp: fp.to_string_lossy().into_owned(),
    })
    .unwrap()
}

fn audio_fixture(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("a.wav");
    std::fs::write(&path, b"fake audio bytes").unwrap();
    path
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn successful_cycle_posts_once_and_clears_the_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(url_path("/results"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let audio = audio_fixture(&dir);
    let body = encoded_request("r1", &audio);

    let handler = handler(StubBehavior::Text(" hello world"), &server.uri());
    let cleanup = handler.handle(&body).await.unwrap();

    // Exactly one POST, decoding to the expected result.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let result = codec::decode_result(&requests[0].body).unwrap();
    assert_eq!(result.request_id, "r1");
    assert_eq!(result.transcription, " hello world");

    // The handler reports the file for cleanup but does not delete it; the
    // consumer removes it only after the ack.
    assert!(audio.exists());
    let cleanup = cleanup.expect("successful cycle returns the audio path");
    assert_eq!(cleanup, audio);

    remove_audio_file(&cleanup).await;
    assert!(!audio.exists());
}

#[tokio::test]
async fn gateway_failure_keeps_the_file_and_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(url_path("/results"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let audio = audio_fixture(&dir);
    let body = encoded_request("r2", &audio);

    let handler = handler(StubBehavior::Text("text"), &server.uri());
    let err = handler.handle(&body).await.unwrap_err();

    assert!(matches!(err, HandlerError::Transient(_)));
    // No ack, no deletion: the message would be redelivered and the file is
    // still there to process.
    assert!(audio.exists());
}

#[tokio::test]
async fn over_limit_audio_never_contacts_the_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(url_path("/results"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let audio = audio_fixture(&dir);
    let body = encoded_request("r3", &audio);

    let handler = handler(StubBehavior::TooLong, &server.uri());
    let err = handler.handle(&body).await.unwrap_err();

    assert!(matches!(err, HandlerError::Deterministic(_)));
    assert!(audio.exists());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_delivery_is_deterministic_and_posts_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(url_path("/results"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let handler = handler(StubBehavior::Text("unused"), &server.uri());
    let err = handler.handle(b"\x93 definitely not a request").await.unwrap_err();

    assert!(matches!(err, HandlerError::Deterministic(_)));
}

#[tokio::test]
async fn missing_file_tolerated_during_cleanup() {
    // Cleanup after a redelivered-but-already-cleaned message must not panic.
    remove_audio_file(Path::new("/nonexistent/litescribe/a.wav")).await;
}
