use std::sync::Arc;

use crate::broker_api;
use crate::config::Config;
use crate::gateway::GatewayClient;
use crate::messaging::{build_pool, QueueConsumer, RetryPublisher};
use crate::metrics::Metrics;
use crate::retry::RetryPolicy;
use crate::shutdown;
use crate::transcriber::Transcriber;
use crate::whisper::{WhisperEngine, WhisperModel};
use crate::worker::TranscribeHandler;

// ── Error type ─────────────────────────────────────────────────────────────────

/// Top-level application error, surfaced only at startup. Each variant wraps
/// the subsystem error so `main.rs` can log one clean line without depending
/// on every sub-module type.
#[derive(Debug)]
pub enum AppError {
    Config(crate::config::ConfigError),
    Io(std::io::Error),
    Model(crate::whisper::ModelError),
    Broker(crate::broker_api::BrokerQueryError),
    Rabbit(crate::messaging::RabbitError),
    Publisher(crate::messaging::PublisherError),
    Consumer(crate::messaging::ConsumerError),
    Runtime(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Model(e) => write!(f, "model load error: {e}"),
            Self::Broker(e) => write!(f, "broker management API error: {e}"),
            Self::Rabbit(e) => write!(f, "broker connection error: {e}"),
            Self::Publisher(e) => write!(f, "retry publisher error: {e}"),
            Self::Consumer(e) => write!(f, "consumer error: {e}"),
            Self::Runtime(e) => write!(f, "runtime error: {e}"),
        }
    }
}

impl std::error::Error for AppError {}

// ── Entry point ────────────────────────────────────────────────────────────────

/// Full application lifecycle.
///
/// # Startup sequence
/// 1. Load and validate configuration from environment variables.
/// 2. Ensure the audio storage directory exists.
/// 3. Build the broker connection pool (bounded exponential backoff).
/// 4. Load the GGML model into memory (blocking; done before any async
///    plumbing is wired up, so no executor thread is held hostage).
/// 5. Probe the management API once for the consumer identity.
/// 6. Wire gateway client → handler → consumer.
/// 7. Run until SIGINT / SIGTERM, let the in-flight job finish, exit.
pub async fn run() -> Result<(), AppError> {
    // ── 1. Configuration ──────────────────────────────────────────────────────
    let cfg = Config::load().map_err(AppError::Config)?;
    cfg.log_summary();

    // ── 2. Storage directory ──────────────────────────────────────────────────
    std::fs::create_dir_all(&cfg.storage_dir).map_err(AppError::Io)?;
    tracing::debug!(path = %cfg.storage_dir.display(), "ensured storage dir exists");

    // ── 3. Metrics and shutdown pair ──────────────────────────────────────────
    let metrics = Arc::new(Metrics::new());
    let (shutdown_handle, shutdown_signal) = shutdown::new_pair();

    // ── 4. Broker pool ────────────────────────────────────────────────────────
    // One connection for the consumer channel, one for the retry publisher.
    let rabbit_pool = build_pool(&cfg.rabbitmq_url, 2)
        .await
        .map_err(AppError::Rabbit)?;

    // ── 5. Whisper model ──────────────────────────────────────────────────────
    // A blocking C-library call, made on the current thread before any tasks
    // are spawned: the runtime is up but idle at this point.
    let model_file = cfg.model_file();
    tracing::info!(
        model = %cfg.model_size,
        path  = %model_file.display(),
        device = %cfg.device,
        compute_type = %cfg.compute_type,
        "🤖 loading GGML model..."
    );
    let model =
        WhisperModel::load(&model_file, cfg.model_size.clone()).map_err(AppError::Model)?;
    tracing::info!(model = %cfg.model_size, "🤖 model loaded");

    let engine = WhisperEngine::new(Arc::new(model));
    let transcriber = Transcriber::new(
        engine,
        cfg.beam_size,
        cfg.n_threads,
        cfg.max_audio_duration_secs,
    );

    // ── 6. Consumer identity ──────────────────────────────────────────────────
    let http = reqwest::Client::new();

    let consumer_count = broker_api::get_consumer_count(
        &http,
        &cfg.rabbitmq_api_base_url,
        &cfg.rabbitmq_user,
        &cfg.rabbitmq_password,
        &cfg.queue,
    )
    .await
    .map_err(AppError::Broker)?;

    let consumer_id = broker_api::consumer_identity(&cfg.queue, consumer_count);
    tracing::info!(consumer_id = %consumer_id, "🪪 consumer identity assigned");

    // ── 7. Gateway client and handler ─────────────────────────────────────────
    let gateway = GatewayClient::new(
        http,
        cfg.gateway_api_base_url.as_str(),
        cfg.gateway_api_token.as_str(),
    );
    let handler = TranscribeHandler::new(Arc::new(transcriber), gateway);

    // ── 8. Publisher and consumer ─────────────────────────────────────────────
    let publisher = RetryPublisher::new(&rabbit_pool, &cfg.queue, &cfg.dead_letter_queue)
        .await
        .map_err(AppError::Publisher)?;

    let consumer = QueueConsumer::new(&rabbit_pool, &cfg.queue, &consumer_id)
        .await
        .map_err(AppError::Consumer)?;

    let policy = RetryPolicy::new(cfg.max_retries);

    tracing::info!(queue = %cfg.queue, "✅ litescribe worker ready");

    // ── 9. Concurrent run + OS-signal wait ────────────────────────────────────
    // The consumer runs in a background task so the current task can wait on
    // the OS signal without blocking the consume loop.
    let consumer_task = tokio::spawn(consumer.run(
        handler,
        publisher,
        policy,
        Arc::clone(&metrics),
        shutdown_signal,
    ));

    shutdown::wait_for_os_signal().await;
    tracing::info!("🛑 signal received, shutting down...");

    // The loop exits after the in-flight delivery (if any) is fully routed.
    shutdown_handle.trigger();

    consumer_task
        .await
        .map_err(|e| AppError::Runtime(e.to_string()))?
        .map_err(AppError::Consumer)?;

    metrics.log_summary();
    tracing::info!("✅ shutdown complete");
    Ok(())
}
