//! Upstash Redis rate limiter (REST API)

use async_trait::async_trait;
use chirp_domain::{
    Clock, RateLimitDecision, RateLimitError, RateLimitPolicy, RateLimiter, SystemClock,
};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

pub const DEFAULT_PREFIX: &str = "chirp:ratelimit";

/// Sliding log over a sorted set scored by attempt time (ms).
///
/// KEYS[1] actor key; ARGV: now_ms, window_ms, capacity, member.
/// Returns {allowed, remaining, reset_at_ms}; reset_at_ms is 0 when the log is empty.
const SLIDING_LOG_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local capacity = tonumber(ARGV[3])

redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)
local allowed = 0
if count < capacity then
  redis.call('ZADD', key, now, ARGV[4])
  redis.call('PEXPIRE', key, window)
  count = count + 1
  allowed = 1
end

local reset = 0
local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
if oldest[2] then
  reset = tonumber(oldest[2]) + window
end

return {allowed, capacity - count, reset}
"#;

/// Rate limiter backed by Redis through the Upstash REST API.
///
/// Each check is one `EVAL`, so the trim, count and record steps are atomic
/// across every process sharing the database.
pub struct UpstashRateLimiter {
    client: Client,
    url: String,
    token: SecretString,
    prefix: String,
    policy: RateLimitPolicy,
    clock: Arc<dyn Clock>,
}

impl UpstashRateLimiter {
    pub fn new(url: String, token: SecretString, policy: RateLimitPolicy, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            token,
            prefix: DEFAULT_PREFIX.to_string(),
            policy,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn key(&self, actor_id: &str) -> String {
        format!("{}:{}", self.prefix, actor_id)
    }
}

#[derive(Deserialize)]
struct UpstashResponse {
    result: Option<Vec<i64>>,
    error: Option<String>,
}

fn request_error(error: reqwest::Error) -> RateLimitError {
    if error.is_timeout() {
        RateLimitError::Timeout
    } else if error.is_decode() {
        RateLimitError::Backend(error.to_string())
    } else {
        RateLimitError::Network(error.to_string())
    }
}

fn unix_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

#[async_trait]
impl RateLimiter for UpstashRateLimiter {
    async fn check_and_consume(
        &self,
        actor_id: &str,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let now_ms = unix_millis(self.clock.now());
        let window_ms = self.policy.window.as_millis().to_string();
        let member = format!("{}:{}", now_ms, Uuid::new_v4());

        let command = serde_json::json!([
            "EVAL",
            SLIDING_LOG_SCRIPT,
            "1",
            self.key(actor_id),
            now_ms.to_string(),
            window_ms,
            self.policy.capacity.to_string(),
            member,
        ]);

        tracing::debug!(actor_id = %actor_id, "Checking rate limit in Upstash");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.token.expose_secret())
            .json(&command)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RateLimitError::Auth("Invalid Upstash token".to_string()));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RateLimitError::Backend(format!(
                "Upstash returned {}: {}",
                status, body
            )));
        }

        let body: UpstashResponse = response.json().await.map_err(request_error)?;

        if let Some(error) = body.error {
            return Err(RateLimitError::Backend(error));
        }

        let (allowed, remaining, reset_ms) = match body.result.as_deref() {
            Some(&[allowed, remaining, reset_ms]) => (allowed == 1, remaining, reset_ms),
            other => {
                return Err(RateLimitError::Backend(format!(
                    "Unexpected script result: {:?}",
                    other
                )));
            }
        };

        let reset_at = (reset_ms > 0)
            .then(|| OffsetDateTime::from_unix_timestamp_nanos(i128::from(reset_ms) * 1_000_000))
            .and_then(Result::ok);

        let limit = self.policy.capacity;
        let decision = if allowed {
            let remaining = u32::try_from(remaining.max(0)).unwrap_or(0);
            RateLimitDecision::allowed(limit, remaining, reset_at)
        } else {
            RateLimitDecision::denied(limit, reset_at)
        };

        Ok(decision)
    }

    fn policy(&self) -> RateLimitPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chirp_domain::ManualClock;
    use time::macros::datetime;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn limiter(server: &MockServer) -> UpstashRateLimiter {
        UpstashRateLimiter::new(
            server.uri(),
            SecretString::new("upstash-token".into()),
            RateLimitPolicy::default(),
            Duration::from_secs(5),
        )
        .with_clock(Arc::new(ManualClock::new(datetime!(2024-01-15 12:00:00 UTC))))
    }

    #[tokio::test]
    async fn test_allowed_decision() {
        let mock_server = MockServer::start().await;
        let now_ms = unix_millis(datetime!(2024-01-15 12:00:00 UTC));

        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("Authorization", "Bearer upstash-token"))
            .and(body_partial_json(serde_json::json!([
                "EVAL",
                SLIDING_LOG_SCRIPT,
                "1",
                "chirp:ratelimit:user_1",
                now_ms.to_string(),
                "60000",
                "5"
            ])))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": [1, 4, now_ms + 60_000]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let decision = limiter(&mock_server)
            .check_and_consume("user_1")
            .await
            .unwrap();

        assert!(decision.allowed);
        assert_eq!(decision.limit, 5);
        assert_eq!(decision.remaining, 4);
        assert_eq!(decision.reset_at, Some(datetime!(2024-01-15 12:01:00 UTC)));
    }

    #[tokio::test]
    async fn test_denied_decision() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": [0, 0, 1705320030000i64]
            })))
            .mount(&mock_server)
            .await;

        let decision = limiter(&mock_server)
            .check_and_consume("user_1")
            .await
            .unwrap();

        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.reset_at, Some(datetime!(2024-01-15 12:00:30 UTC)));
    }

    #[tokio::test]
    async fn test_custom_prefix_keys_actor() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!([
                "EVAL",
                SLIDING_LOG_SCRIPT,
                "1",
                "posts:user_9"
            ])))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": [1, 4, 0]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let decision = limiter(&mock_server)
            .with_prefix("posts")
            .check_and_consume("user_9")
            .await
            .unwrap();

        assert!(decision.allowed);
        assert_eq!(decision.reset_at, None);
    }

    #[tokio::test]
    async fn test_script_error_is_backend_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": "ERR Error running script"
            })))
            .mount(&mock_server)
            .await;

        let result = limiter(&mock_server).check_and_consume("user_1").await;

        assert!(matches!(result, Err(RateLimitError::Backend(msg)) if msg.contains("script")));
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let result = limiter(&mock_server).check_and_consume("user_1").await;

        assert!(matches!(result, Err(RateLimitError::Auth(_))));
    }

    #[tokio::test]
    async fn test_timeout_reports_unknown_outcome() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "result": [1, 4, 0] }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let limiter = UpstashRateLimiter::new(
            mock_server.uri(),
            SecretString::new("upstash-token".into()),
            RateLimitPolicy::default(),
            Duration::from_millis(100),
        );

        let result = limiter.check_and_consume("user_1").await;

        assert!(matches!(result, Err(RateLimitError::Timeout)));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        let limiter = UpstashRateLimiter::new(
            "http://127.0.0.1:1".to_string(),
            SecretString::new("upstash-token".into()),
            RateLimitPolicy::default(),
            Duration::from_secs(2),
        );

        let result = limiter.check_and_consume("user_1").await;

        assert!(matches!(result, Err(RateLimitError::Network(_))));
    }
}
