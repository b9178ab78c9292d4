//! Posts use case - enriched listing and rate-limited creation

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use time::OffsetDateTime;

use crate::{
    model::{EnrichedPost, Post, PostAuthor},
    policy::{self, PolicyViolation},
    ports::{IdentityError, IdentityProvider, PostStore, RateLimitError, RateLimiter, StoreError},
};

/// Number of posts returned by a listing
pub const RECENT_POSTS_LIMIT: usize = 100;

/// External system a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    IdentityProvider,
    RateLimiter,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::IdentityProvider => f.write_str("identity provider"),
            Dependency::RateLimiter => f.write_str("rate limiter"),
        }
    }
}

/// Caller-facing classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    BadRequest,
    TooManyRequests,
    InternalServerError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::TooManyRequests => "TOO_MANY_REQUESTS",
            ErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn is_client_error(&self) -> bool {
        !matches!(self, ErrorCode::InternalServerError)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from the posts use case
#[derive(Debug, thiserror::Error)]
pub enum PostsError {
    #[error("{0}")]
    Validation(String),
    #[error("You are doing that too much. Please try again later.")]
    RateLimitExceeded { reset_at: Option<OffsetDateTime> },
    #[error("Author not found: {author_id}")]
    Integrity { author_id: String },
    #[error("{dependency} unavailable: {message}")]
    DependencyUnavailable {
        dependency: Dependency,
        message: String,
        retryable: bool,
    },
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PostsError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PostsError::Validation(_) => ErrorCode::BadRequest,
            PostsError::RateLimitExceeded { .. } => ErrorCode::TooManyRequests,
            PostsError::Integrity { .. }
            | PostsError::DependencyUnavailable { .. }
            | PostsError::Storage(_) => ErrorCode::InternalServerError,
        }
    }

    /// Whether the caller may safely repeat the same request later
    pub fn is_retryable(&self) -> bool {
        match self {
            PostsError::RateLimitExceeded { .. } => true,
            PostsError::DependencyUnavailable { retryable, .. } => *retryable,
            PostsError::Validation(_) | PostsError::Integrity { .. } | PostsError::Storage(_) => {
                false
            }
        }
    }
}

impl From<PolicyViolation> for PostsError {
    fn from(violation: PolicyViolation) -> Self {
        PostsError::Validation(violation.to_string())
    }
}

impl From<IdentityError> for PostsError {
    fn from(error: IdentityError) -> Self {
        PostsError::DependencyUnavailable {
            dependency: Dependency::IdentityProvider,
            message: error.to_string(),
            retryable: true,
        }
    }
}

impl From<RateLimitError> for PostsError {
    fn from(error: RateLimitError) -> Self {
        // A timed-out consume may already have been counted
        let retryable = !matches!(error, RateLimitError::Timeout);
        PostsError::DependencyUnavailable {
            dependency: Dependency::RateLimiter,
            message: error.to_string(),
            retryable,
        }
    }
}

impl From<StoreError> for PostsError {
    fn from(error: StoreError) -> Self {
        PostsError::Storage(error.to_string())
    }
}

/// Posts service: joins stored posts with identity profiles and gates writes
pub struct PostsService<S, I, R>
where
    S: PostStore + ?Sized,
    I: IdentityProvider + ?Sized,
    R: RateLimiter + ?Sized,
{
    store: Arc<S>,
    identity: Arc<I>,
    rate_limiter: Arc<R>,
}

impl<S, I, R> Clone for PostsService<S, I, R>
where
    S: PostStore + ?Sized,
    I: IdentityProvider + ?Sized,
    R: RateLimiter + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            identity: Arc::clone(&self.identity),
            rate_limiter: Arc::clone(&self.rate_limiter),
        }
    }
}

impl<S, I, R> PostsService<S, I, R>
where
    S: PostStore + ?Sized,
    I: IdentityProvider + ?Sized,
    R: RateLimiter + ?Sized,
{
    pub fn new(store: Arc<S>, identity: Arc<I>, rate_limiter: Arc<R>) -> Self {
        Self {
            store,
            identity,
            rate_limiter,
        }
    }

    /// List the most recent posts, each with its author.
    ///
    /// Fails as a whole if any post's author cannot be resolved to a profile
    /// with a username.
    pub async fn list_recent(&self) -> Result<Vec<EnrichedPost>, PostsError> {
        let posts = self.store.list_recent(RECENT_POSTS_LIMIT).await?;

        if posts.is_empty() {
            tracing::debug!("No posts to list");
            return Ok(vec![]);
        }

        let author_ids: BTreeSet<String> = posts.iter().map(|p| p.author_id.clone()).collect();

        tracing::debug!(
            posts = posts.len(),
            authors = author_ids.len(),
            "Resolving post authors"
        );

        let profiles = self.identity.resolve_authors(&author_ids).await?;

        let enriched = posts
            .into_iter()
            .map(|post| {
                let author = profiles
                    .get(&post.author_id)
                    .and_then(PostAuthor::from_profile)
                    .ok_or_else(|| {
                        tracing::warn!(
                            post_id = %post.id,
                            author_id = %post.author_id,
                            "Post references an unresolvable author"
                        );
                        PostsError::Integrity {
                            author_id: post.author_id.clone(),
                        }
                    })?;
                Ok(EnrichedPost { post, author })
            })
            .collect::<Result<Vec<_>, PostsError>>()?;

        tracing::info!(count = enriched.len(), "Listed recent posts");

        Ok(enriched)
    }

    /// Create a post on behalf of an already-authenticated actor
    pub async fn create_post(&self, actor_id: &str, content: &str) -> Result<Post, PostsError> {
        policy::check_actor(actor_id)?;
        policy::check_content(content)?;

        let decision = self.rate_limiter.check_and_consume(actor_id).await?;

        if !decision.allowed {
            tracing::warn!(
                actor_id = %actor_id,
                limit = decision.limit,
                reset_at = ?decision.reset_at,
                "Rate limit exceeded"
            );
            return Err(PostsError::RateLimitExceeded {
                reset_at: decision.reset_at,
            });
        }

        let post = self.store.insert(actor_id, content).await?;

        tracing::info!(
            post_id = %post.id,
            author_id = %post.author_id,
            remaining = decision.remaining,
            "Created post"
        );

        Ok(post)
    }
}
