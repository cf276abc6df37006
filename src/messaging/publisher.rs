use lapin::{
    options::{BasicPublishOptions, QueueDeclareOptions},
    types::{AMQPValue, FieldTable},
    BasicProperties, Channel,
};

use super::rabbit::{retry_queue_name, Pool, RETRY_TTL_MS};

/// AMQP header carrying the number of attempts a delivery has already had.
pub const RETRY_COUNT_HEADER: &str = "x-retry-count";

// ── Error ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum PublisherError {
    Connection(String),
    Channel(String),
    Topology(String),
    Publish(String),
}

impl std::fmt::Display for PublisherError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection(m) => write!(f, "publisher connection error: {m}"),
            Self::Channel(m) => write!(f, "publisher channel error: {m}"),
            Self::Topology(m) => write!(f, "topology declaration failed: {m}"),
            Self::Publish(m) => write!(f, "publish failed: {m}"),
        }
    }
}

impl std::error::Error for PublisherError {}

// ── RetryPublisher ─────────────────────────────────────────────────────────────

/// Republishes failed deliveries: to the retry queue while attempts remain,
/// to the dead-letter queue once they are exhausted.
///
/// Holds one AMQP channel for all outbound publishing. `Clone` is an `Arc`
/// increment on the channel, which also keeps the parent connection alive.
#[derive(Clone)]
pub struct RetryPublisher {
    channel: Channel,
    retry_queue: String,
    dead_letter_queue: String,
}

impl RetryPublisher {
    /// Open a channel from `pool` and declare the retry and dead-letter
    /// queues for the given main queue.
    pub async fn new(
        pool: &Pool,
        queue: &str,
        dead_letter_queue: &str,
    ) -> Result<Self, PublisherError> {
        let conn = pool
            .get()
            .await
            .map_err(|e| PublisherError::Connection(e.to_string()))?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| PublisherError::Channel(e.to_string()))?;

        // conn (pool object) drops here; the channel's internal
        // Arc<Connection> keeps the underlying TCP connection alive.

        let retry_queue = retry_queue_name(queue);
        declare_retry_topology(&channel, queue, &retry_queue, dead_letter_queue).await?;

        tracing::info!(
            retry_queue = %retry_queue,
            dead_letter_queue = %dead_letter_queue,
            "retry publisher ready"
        );

        Ok(Self {
            channel,
            retry_queue,
            dead_letter_queue,
        })
    }

    /// Republish a delivery body to the retry queue with the incremented
    /// attempt count in the `x-retry-count` header. The queue's TTL and
    /// dead-letter arguments route it back to the main queue after the
    /// retry delay.
    pub async fn publish_retry(&self, body: &[u8], next_attempt: i32) -> Result<(), PublisherError> {
        let mut headers = FieldTable::default();
        headers.insert(RETRY_COUNT_HEADER.into(), AMQPValue::LongInt(next_attempt));

        let props = BasicProperties::default()
            .with_content_type("application/msgpack".into())
            .with_delivery_mode(2) // persistent
            .with_headers(headers);

        self.publish(&self.retry_queue, body, props).await
    }

    /// Publish a delivery body to the dead-letter queue, keeping the final
    /// attempt count in the header for operator inspection.
    pub async fn publish_dead_letter(
        &self,
        body: &[u8],
        retry_count: i32,
    ) -> Result<(), PublisherError> {
        let mut headers = FieldTable::default();
        headers.insert(RETRY_COUNT_HEADER.into(), AMQPValue::LongInt(retry_count));

        let props = BasicProperties::default()
            .with_content_type("application/msgpack".into())
            .with_delivery_mode(2) // persistent
            .with_headers(headers);

        self.publish(&self.dead_letter_queue, body, props).await
    }

    async fn publish(
        &self,
        queue: &str,
        body: &[u8],
        props: BasicProperties,
    ) -> Result<(), PublisherError> {
        // Default exchange: routing key is the queue name.
        self.channel
            .basic_publish("", queue, BasicPublishOptions::default(), body, props)
            .await
            .map_err(|e| PublisherError::Publish(e.to_string()))?;

        Ok(())
    }
}

// ── Topology ───────────────────────────────────────────────────────────────────

/// Declare the retry and dead-letter queues.
///
/// The retry queue is durable with `x-message-ttl` and dead-letter arguments
/// pointing back at the main queue through the default exchange: an expired
/// retry message re-enters the main queue as a fresh delivery, carrying its
/// `x-retry-count` header. The dead-letter queue is a plain durable queue.
async fn declare_retry_topology(
    channel: &Channel,
    main_queue: &str,
    retry_queue: &str,
    dead_letter_queue: &str,
) -> Result<(), PublisherError> {
    let mut retry_args = FieldTable::default();
    retry_args.insert("x-message-ttl".into(), AMQPValue::LongInt(RETRY_TTL_MS));
    retry_args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString(Vec::new().into()),
    );
    retry_args.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(main_queue.as_bytes().to_vec().into()),
    );

    channel
        .queue_declare(
            retry_queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            retry_args,
        )
        .await
        .map_err(|e| PublisherError::Topology(format!("queue '{retry_queue}': {e}")))?;

    channel
        .queue_declare(
            dead_letter_queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| PublisherError::Topology(format!("queue '{dead_letter_queue}': {e}")))?;

    Ok(())
}
