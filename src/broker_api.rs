//! One-shot client for the broker's management HTTP API.
//!
//! Used exactly once at startup to count the consumers already bound to the
//! target queue, from which a human-readable consumer identity is derived.

use serde::Deserialize;

use crate::config::CONSUMER_ID_PREFIX;

// ── Error ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum BrokerQueryError {
    /// The request never produced a response.
    Transport(String),
    /// The management API answered with a non-2xx status.
    Status { status: u16, body: String },
    /// The response body was not the expected JSON shape.
    Parse(String),
}

impl std::fmt::Display for BrokerQueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "management API request failed: {msg}"),
            Self::Status { status, body } => {
                write!(f, "management API returned {status}: {body}")
            }
            Self::Parse(msg) => write!(f, "management API response unparseable: {msg}"),
        }
    }
}

impl std::error::Error for BrokerQueryError {}

// ── Queries ────────────────────────────────────────────────────────────────────

/// Subset of the management API's queue object we care about.
#[derive(Debug, Deserialize)]
struct QueueInfo {
    /// Absent while the queue has never had a consumer.
    #[serde(default)]
    consumers: u32,
}

/// Number of consumers currently bound to `queue_name`.
///
/// Issues one authenticated GET to `{api_base_url}/api/queues/{queue_name}/`
/// and returns the `consumers` field, defaulting to 0 when absent. Any
/// non-2xx status or transport failure is a [`BrokerQueryError`], propagated
/// without retry.
pub async fn get_consumer_count(
    client: &reqwest::Client,
    api_base_url: &str,
    user: &str,
    password: &str,
    queue_name: &str,
) -> Result<u32, BrokerQueryError> {
    let url = format!(
        "{}/api/queues/{}/",
        api_base_url.trim_end_matches('/'),
        queue_name
    );

    let response = client
        .get(&url)
        .basic_auth(user, Some(password))
        .send()
        .await
        .map_err(|e| BrokerQueryError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BrokerQueryError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let info: QueueInfo = response
        .json()
        .await
        .map_err(|e| BrokerQueryError::Parse(e.to_string()))?;

    Ok(info.consumers)
}

/// Informational consumer identity, `"litescribe-{queue}-{count + 1}"`.
///
/// Carries no uniqueness guarantee: two workers starting at the same moment
/// may compute the same id. It is only for logs and diagnostics, never for
/// broker-side identification.
pub fn consumer_identity(queue_name: &str, consumer_count: u32) -> String {
    format!("{CONSUMER_ID_PREFIX}-{queue_name}-{}", consumer_count + 1)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_prefix_queue_and_successor_count() {
        assert_eq!(consumer_identity("base", 3), "litescribe-base-4");
        assert_eq!(consumer_identity("tiny", 0), "litescribe-tiny-1");
    }

    #[test]
    fn consumers_field_defaults_to_zero() {
        let info: QueueInfo = serde_json::from_str(r#"{"name": "base"}"#).unwrap();
        assert_eq!(info.consumers, 0);

        let info: QueueInfo = serde_json::from_str(r#"{"consumers": 3}"#).unwrap();
        assert_eq!(info.consumers, 3);
    }
}
