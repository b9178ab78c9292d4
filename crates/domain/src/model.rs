//! Domain models and value objects

use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;

/// A persisted post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Opaque unique identifier assigned by the store
    pub id: String,
    /// Identity-provider id of the author (not a store-enforced reference)
    pub author_id: String,
    /// Post text, at least one character
    pub content: String,
    /// When the post was created
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Minimal public projection of an identity-provider user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorProfile {
    pub id: String,
    /// Nullable at the provider; a profile without one cannot be displayed
    pub username: Option<String>,
    pub profile_image_url: String,
}

/// Author shape attached to a listed post. The username is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostAuthor {
    pub id: String,
    pub username: String,
    pub profile_image_url: String,
}

impl PostAuthor {
    /// Build a displayable author, or `None` if the profile has no usable username
    pub fn from_profile(profile: &AuthorProfile) -> Option<Self> {
        let username = profile.username.as_deref().filter(|name| !name.is_empty())?;

        Some(Self {
            id: profile.id.clone(),
            username: username.to_string(),
            profile_image_url: profile.profile_image_url.clone(),
        })
    }
}

/// A post joined with its resolved author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedPost {
    pub post: Post,
    pub author: PostAuthor,
}

/// Sliding-window quota applied per actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Accepted operations per window
    pub capacity: u32,
    /// Length of the trailing window
    pub window: Duration,
}

impl RateLimitPolicy {
    pub const DEFAULT_CAPACITY: u32 = 5;
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

    pub fn new(capacity: u32, window: Duration) -> Self {
        Self { capacity, window }
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY, Self::DEFAULT_WINDOW)
    }
}

/// Outcome of a single rate limit check for one actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Window capacity that applied to this check
    pub limit: u32,
    /// Quota left in the current window after this check
    pub remaining: u32,
    /// When the oldest counted attempt leaves the window, if known
    #[serde(with = "time::serde::rfc3339::option")]
    pub reset_at: Option<OffsetDateTime>,
}

impl RateLimitDecision {
    pub fn allowed(limit: u32, remaining: u32, reset_at: Option<OffsetDateTime>) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            reset_at,
        }
    }

    pub fn denied(limit: u32, reset_at: Option<OffsetDateTime>) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn profile(username: Option<&str>) -> AuthorProfile {
        AuthorProfile {
            id: "user_1".to_string(),
            username: username.map(str::to_string),
            profile_image_url: "https://img.example/user_1.png".to_string(),
        }
    }

    #[test]
    fn test_post_author_requires_username() {
        assert!(PostAuthor::from_profile(&profile(None)).is_none());
        assert!(PostAuthor::from_profile(&profile(Some(""))).is_none());

        let author = PostAuthor::from_profile(&profile(Some("alice"))).unwrap();
        assert_eq!(author.id, "user_1");
        assert_eq!(author.username, "alice");
    }

    #[test]
    fn test_post_serializes_camel_case() {
        let post = Post {
            id: "p1".to_string(),
            author_id: "user_1".to_string(),
            content: "hello".to_string(),
            created_at: datetime!(2024-01-15 12:00:00 UTC),
        };

        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(value["authorId"], "user_1");
        assert_eq!(value["createdAt"], "2024-01-15T12:00:00Z");
    }

    #[test]
    fn test_default_policy_is_five_per_minute() {
        let policy = RateLimitPolicy::default();
        assert_eq!(policy.capacity, 5);
        assert_eq!(policy.window, Duration::from_secs(60));
    }
}
