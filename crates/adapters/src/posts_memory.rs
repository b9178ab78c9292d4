//! In-memory post store for testing and offline mode

use async_trait::async_trait;
use chirp_domain::{Clock, Post, PostStore, StoreError, SystemClock};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// In-memory post store implementation
pub struct InMemoryPostStore {
    posts: RwLock<Vec<Post>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            posts: RwLock::new(Vec::new()),
            clock,
        }
    }
}

impl Default for InMemoryPostStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn list_recent(&self, limit: usize) -> Result<Vec<Post>, StoreError> {
        let posts = self
            .posts
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        // Newest insert first, then a stable sort keeps that order among equal timestamps
        let mut recent: Vec<Post> = posts.iter().rev().cloned().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(limit);

        Ok(recent)
    }

    async fn insert(&self, author_id: &str, content: &str) -> Result<Post, StoreError> {
        let post = Post {
            id: Uuid::new_v4().to_string(),
            author_id: author_id.to_string(),
            content: content.to_string(),
            created_at: self.clock.now(),
        };

        let mut posts = self
            .posts
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        posts.push(post.clone());

        Ok(post)
    }
}
