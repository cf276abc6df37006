use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    message::Delivery,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions,
        QueueDeclareOptions,
    },
    types::{AMQPValue, FieldTable},
    Channel,
};

use crate::metrics::Metrics;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::shutdown::ShutdownSignal;

use super::publisher::{RetryPublisher, RETRY_COUNT_HEADER};
use super::rabbit::Pool;

/// Unacknowledged-delivery limit. One message in flight per process is the
/// backpressure mechanism of the whole system: the broker withholds the next
/// delivery until the current one is acked, and horizontal scaling happens
/// by running more worker processes against the same queue.
const PREFETCH_COUNT: u16 = 1;

// ── Handler seam ───────────────────────────────────────────────────────────────

/// Failure classification returned by a [`MessageHandler`].
///
/// The split decides routing: deterministic failures go straight to the
/// dead-letter queue because retrying them cannot change the outcome, while
/// transient ones pass through the retry policy first.
#[derive(Debug)]
pub enum HandlerError {
    /// Retrying cannot succeed: malformed message, over-limit audio,
    /// missing or unreadable file.
    Deterministic(String),
    /// Retrying may succeed: gateway unavailable, inference failure.
    Transient(String),
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deterministic(m) => write!(f, "deterministic failure: {m}"),
            Self::Transient(m) => write!(f, "transient failure: {m}"),
        }
    }
}

impl std::error::Error for HandlerError {}

/// Per-message processing, pluggable into [`QueueConsumer`].
///
/// An implementation performs decode → transcribe → post and returns the
/// path of the local audio file to remove once the delivery is acked (or
/// `None` when there is nothing to clean up). It must not acknowledge the
/// delivery itself; ack, cleanup and failure routing belong to the consumer.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, body: &[u8]) -> Result<Option<PathBuf>, HandlerError>;
}

// ── Error ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConsumerError {
    Connection(String),
    Channel(String),
    Topology(String),
    Qos(String),
    Start(String),
}

impl std::fmt::Display for ConsumerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection(m) => write!(f, "consumer connection error: {m}"),
            Self::Channel(m) => write!(f, "consumer channel error: {m}"),
            Self::Topology(m) => write!(f, "topology declaration failed: {m}"),
            Self::Qos(m) => write!(f, "QoS setup failed: {m}"),
            Self::Start(m) => write!(f, "failed to start consuming: {m}"),
        }
    }
}

impl std::error::Error for ConsumerError {}

// ── QueueConsumer ──────────────────────────────────────────────────────────────

/// The single concrete queue consumer.
///
/// Declares the durable main queue, sets `prefetch = 1`, and drives a
/// pluggable [`MessageHandler`] one delivery at a time. Per delivery the
/// order is fixed: handle (decode → transcribe → post) → ack → delete the
/// local audio file. Nothing is acked and nothing is deleted unless the
/// handler succeeded, so a crash or failure anywhere earlier leaves the
/// message eligible for redelivery.
pub struct QueueConsumer {
    channel: Channel,
    queue: String,
    consumer_id: String,
}

impl QueueConsumer {
    /// Obtain a connection from `pool`, open a channel, declare the durable
    /// queue and configure QoS.
    ///
    /// `consumer_id` is the informational identity (also used as the AMQP
    /// consumer tag) computed from the management-API probe at startup.
    pub async fn new(pool: &Pool, queue: &str, consumer_id: &str) -> Result<Self, ConsumerError> {
        let conn = pool
            .get()
            .await
            .map_err(|e| ConsumerError::Connection(e.to_string()))?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| ConsumerError::Channel(e.to_string()))?;

        // conn (pool object) drops here; the channel's internal
        // Arc<Connection> keeps the underlying TCP connection alive.

        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| ConsumerError::Topology(format!("queue '{queue}': {e}")))?;

        channel
            .basic_qos(PREFETCH_COUNT, BasicQosOptions { global: false })
            .await
            .map_err(|e| ConsumerError::Qos(e.to_string()))?;

        tracing::info!(
            queue,
            consumer_id,
            prefetch = PREFETCH_COUNT,
            "consumer bound"
        );

        Ok(Self {
            channel,
            queue: queue.to_string(),
            consumer_id: consumer_id.to_string(),
        })
    }

    /// Consume until the shutdown signal fires or the delivery stream ends.
    ///
    /// The loop is strictly sequential: the next delivery is not awaited
    /// until the current one is fully routed, and `prefetch = 1` means the
    /// broker would not send one anyway. `biased` keeps a busy queue from
    /// starving the shutdown branch; an in-flight delivery still finishes
    /// before the loop exits.
    pub async fn run<H: MessageHandler>(
        self,
        handler: H,
        publisher: RetryPublisher,
        policy: RetryPolicy,
        metrics: Arc<Metrics>,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), ConsumerError> {
        let mut deliveries = self
            .channel
            .basic_consume(
                &self.queue,
                &self.consumer_id,
                BasicConsumeOptions {
                    no_ack: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| ConsumerError::Start(e.to_string()))?;

        tracing::info!(queue = %self.queue, "▶️  consuming");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.wait() => {
                    tracing::info!("🛑 shutdown signal received, no further deliveries will be taken");
                    break;
                }

                next = deliveries.next() => {
                    match next {
                        None => {
                            tracing::warn!("delivery stream closed by the broker");
                            break;
                        }
                        Some(Err(e)) => {
                            tracing::error!(error = %e, "consumer stream error");
                            break;
                        }
                        Some(Ok(delivery)) => {
                            process_delivery(&handler, &publisher, policy, &metrics, delivery).await;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

// ── Per-delivery routing ───────────────────────────────────────────────────────

/// Drive one delivery through the handler and route the outcome.
///
/// - success → ack, then remove the local audio file;
/// - deterministic failure → dead-letter + ack;
/// - transient failure → retry queue + ack while attempts remain, otherwise
///   dead-letter + ack;
/// - any republish failure → nack with `requeue = true`, so the message is
///   never lost between queues.
async fn process_delivery<H: MessageHandler>(
    handler: &H,
    publisher: &RetryPublisher,
    policy: RetryPolicy,
    metrics: &Metrics,
    delivery: Delivery,
) {
    metrics.inc_received();
    metrics.inc_in_flight();

    let retry_count = extract_retry_count(&delivery).unwrap_or(0);

    if retry_count > 0 {
        tracing::info!(retry_count, max = policy.max_retries, "▶️  redelivered job");
    }

    match handler.handle(&delivery.data).await {
        Ok(cleanup) => {
            metrics.inc_succeeded();

            // Result is already at the gateway; the broker may now forget
            // the message, and only then does the file go away.
            let _ = delivery.ack(BasicAckOptions::default()).await;

            if let Some(path) = cleanup {
                remove_audio_file(&path).await;
            }
        }

        Err(HandlerError::Deterministic(msg)) => {
            tracing::warn!("⚠️  unprocessable delivery, dead-lettering: {msg}");
            dead_letter(publisher, metrics, &delivery, retry_count).await;
        }

        Err(HandlerError::Transient(msg)) => match policy.decide(retry_count) {
            RetryDecision::Retry { next_attempt } => {
                metrics.inc_retried();
                tracing::info!(
                    "🔄 retry {next_attempt}/{}: {msg}",
                    policy.max_retries
                );

                match publisher.publish_retry(&delivery.data, next_attempt).await {
                    Ok(_) => {
                        let _ = delivery.ack(BasicAckOptions::default()).await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "❌ retry publish failed, NACKing");
                        nack_requeue(&delivery).await;
                    }
                }
            }
            RetryDecision::DeadLetter => {
                tracing::error!(
                    retry_count,
                    "❌ retries exhausted, dead-lettering: {msg}"
                );
                dead_letter(publisher, metrics, &delivery, retry_count).await;
            }
        },
    }

    metrics.dec_in_flight();
}

/// Publish the delivery body to the dead-letter queue and ack. On publish
/// failure, nack with requeue so the broker redelivers instead of dropping.
async fn dead_letter(
    publisher: &RetryPublisher,
    metrics: &Metrics,
    delivery: &Delivery,
    retry_count: i32,
) {
    match publisher
        .publish_dead_letter(&delivery.data, retry_count)
        .await
    {
        Ok(_) => {
            metrics.inc_dead_lettered();
            let _ = delivery.ack(BasicAckOptions::default()).await;
        }
        Err(e) => {
            tracing::error!(error = %e, "❌ dead-letter publish failed, NACKing");
            nack_requeue(delivery).await;
        }
    }
}

async fn nack_requeue(delivery: &Delivery) {
    let _ = delivery
        .nack(BasicNackOptions {
            multiple: false,
            requeue: true,
        })
        .await;
}

/// Remove the processed audio file. Runs strictly after the ack. Failure
/// here is logged and otherwise ignored: the result is delivered and the
/// message acked, so a leftover file is an operational annoyance, not a
/// correctness problem.
pub async fn remove_audio_file(path: &std::path::Path) {
    match tokio::fs::remove_file(path).await {
        Ok(_) => tracing::debug!(path = %path.display(), "audio file removed"),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not remove audio file")
        }
    }
}

/// Extract `x-retry-count` from the AMQP headers, accepting any integer
/// width the producer may have used.
fn extract_retry_count(delivery: &Delivery) -> Option<i32> {
    delivery
        .properties
        .headers()
        .as_ref()?
        .inner()
        .get(RETRY_COUNT_HEADER)
        .and_then(|v| match v {
            AMQPValue::LongInt(n) => Some(*n),
            AMQPValue::LongLongInt(n) => Some(*n as i32),
            AMQPValue::ShortInt(n) => Some(i32::from(*n)),
            AMQPValue::ShortShortInt(n) => Some(i32::from(*n)),
            _ => None,
        })
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // The prefetch window is the system's backpressure contract: exactly one
    // unacked delivery per process.
    #[test]
    fn prefetch_is_fixed_at_one() {
        assert_eq!(PREFETCH_COUNT, 1);
    }
}
