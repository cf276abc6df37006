use std::time::Duration;

use deadpool_lapin::Manager;
use lapin::ConnectionProperties;

/// Re-exported so other modules inside `messaging/` can import Pool from here.
pub type Pool = deadpool_lapin::Pool;

// ── Topology naming ────────────────────────────────────────────────────────────
// Queues are addressed through the default exchange: the main queue carries
// the configured tier name, and the retry queue is derived from it. Failed
// retry-queue messages expire back onto the main queue via per-queue TTL +
// dead-letter arguments (see `publisher::declare_retry_topology`).

/// Name of the TTL'd holding queue for retried deliveries.
pub fn retry_queue_name(queue: &str) -> String {
    format!("{queue}.retry")
}

/// `x-message-ttl` on the retry queue in milliseconds. After this delay the
/// broker routes the message back to the main queue.
pub const RETRY_TTL_MS: i32 = 5_000;

// ── Connection retry ───────────────────────────────────────────────────────────

const MAX_CONNECT_ATTEMPTS: u32 = 8;
const CONNECT_BACKOFF_BASE: Duration = Duration::from_secs(1);
const CONNECT_BACKOFF_CAP: Duration = Duration::from_secs(30);

// ── Error ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum RabbitError {
    /// Could not establish a connection after all backoff attempts.
    Connection(String),
    /// Failed to build the connection pool itself.
    Pool(String),
}

impl std::fmt::Display for RabbitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "broker connection failed: {msg}"),
            Self::Pool(msg) => write!(f, "connection pool build failed: {msg}"),
        }
    }
}

impl std::error::Error for RabbitError {}

// ── Pool constructor ───────────────────────────────────────────────────────────

/// Build a [`deadpool_lapin`] connection pool and verify connectivity.
///
/// Connectivity is probed with bounded exponential backoff (1 s base,
/// doubling up to 30 s, [`MAX_CONNECT_ATTEMPTS`] attempts) before the error
/// escalates to a fatal startup failure.
pub async fn build_pool(url: &str, max_connections: usize) -> Result<Pool, RabbitError> {
    let manager = Manager::new(url, ConnectionProperties::default());

    let pool = Pool::builder(manager)
        .max_size(max_connections)
        .build()
        .map_err(|e| RabbitError::Pool(e.to_string()))?;

    let mut backoff = CONNECT_BACKOFF_BASE;

    for attempt in 1..=MAX_CONNECT_ATTEMPTS {
        match pool.get().await {
            Ok(_) => {
                tracing::info!("📡 broker connected");
                return Ok(pool);
            }
            Err(e) if attempt < MAX_CONNECT_ATTEMPTS => {
                tracing::warn!(
                    attempt,
                    max = MAX_CONNECT_ATTEMPTS,
                    error = %e,
                    "⚠️  broker not ready, retrying in {}s...",
                    backoff.as_secs()
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(CONNECT_BACKOFF_CAP);
            }
            Err(e) => {
                return Err(RabbitError::Connection(format!(
                    "failed after {MAX_CONNECT_ATTEMPTS} attempts: {e}"
                )));
            }
        }
    }

    unreachable!()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_queue_is_derived_from_the_tier() {
        assert_eq!(retry_queue_name("base"), "base.retry");
        assert_eq!(retry_queue_name("large"), "large.retry");
    }
}
