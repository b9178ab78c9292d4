//! Process-local sliding-window rate limiter

use async_trait::async_trait;
use chirp_domain::{
    Clock, RateLimitDecision, RateLimitError, RateLimitPolicy, RateLimiter, SystemClock,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

/// In-memory sliding log per actor.
///
/// Only correct within a single process; use a shared backend when several
/// instances serve writes.
pub struct InMemoryRateLimiter {
    policy: RateLimitPolicy,
    clock: Arc<dyn Clock>,
    attempts: Mutex<HashMap<String, VecDeque<OffsetDateTime>>>,
}

impl InMemoryRateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: RateLimitPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            attempts: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check_and_consume(
        &self,
        actor_id: &str,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let now = self.clock.now();
        let window_start = now - self.policy.window;
        let capacity = self.policy.capacity;

        let mut attempts = self
            .attempts
            .lock()
            .map_err(|e| RateLimitError::Backend(e.to_string()))?;
        let log = attempts.entry(actor_id.to_string()).or_default();

        while log.front().is_some_and(|at| *at <= window_start) {
            log.pop_front();
        }

        let allowed = log.len() < capacity as usize;
        if allowed {
            log.push_back(now);
        }

        let reset_at = log.front().map(|oldest| *oldest + self.policy.window);

        let decision = if allowed {
            RateLimitDecision::allowed(capacity, capacity - log.len() as u32, reset_at)
        } else {
            RateLimitDecision::denied(capacity, reset_at)
        };

        Ok(decision)
    }

    fn policy(&self) -> RateLimitPolicy {
        self.policy
    }
}
