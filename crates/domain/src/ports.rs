//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{AuthorProfile, Post, RateLimitDecision, RateLimitPolicy};

/// Maximum number of ids the identity provider accepts in one lookup
pub const IDENTITY_BATCH_LIMIT: usize = 100;

/// Error type for identity provider operations
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("API error: {0}")]
    Api(String),
}

/// Port for resolving author ids to public profiles
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Look up profiles for the given ids.
    ///
    /// Ids the provider does not know are simply absent from the returned map.
    /// A failed call is always an error, never an empty map.
    async fn resolve_authors(
        &self,
        ids: &BTreeSet<String>,
    ) -> Result<HashMap<String, AuthorProfile>, IdentityError>;
}

/// Error type for rate limiter operations
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Network error: {0}")]
    Network(String),
    /// The attempt may or may not have been recorded
    #[error("Request timed out, quota consumption unknown")]
    Timeout,
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Port for a per-actor sliding-window rate limiter
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check the actor's window and, if under capacity, record this attempt.
    /// Both happen in one atomic step.
    async fn check_and_consume(&self, actor_id: &str)
    -> Result<RateLimitDecision, RateLimitError>;

    /// The quota this limiter enforces
    fn policy(&self) -> RateLimitPolicy;
}

/// Error type for post store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for persisting posts
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Most recent posts first, at most `limit`
    async fn list_recent(&self, limit: usize) -> Result<Vec<Post>, StoreError>;

    /// Insert a new post, assigning its id and creation time
    async fn insert(&self, author_id: &str, content: &str) -> Result<Post, StoreError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: OffsetDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
