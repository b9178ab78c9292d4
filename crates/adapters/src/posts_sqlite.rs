//! SQLite post store implementation

use async_trait::async_trait;
use chirp_domain::{Clock, Post, PostStore, StoreError, SystemClock};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

type PostRow = (String, String, String, i64);

/// SQLite-backed post store
pub struct SqlitePostStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqlitePostStore {
    /// Open (or create) the database file and run migrations
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Database(format!("Failed to create directory: {}", e)))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Self::from_pool(pool).await
    }

    /// Create an in-memory SQLite store (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self {
            pool,
            clock: Arc::new(SystemClock),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Use a different clock for `created_at` assignment
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Close the pool, waiting for connections to finish
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Number of stored posts
    pub async fn count(&self) -> Result<i64, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(count.0)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        // created_at holds unix nanoseconds so ordering is numeric
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY,
                author_id TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_author_id ON posts(author_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

fn post_from_row((id, author_id, content, created_at): PostRow) -> Result<Post, StoreError> {
    let created_at = OffsetDateTime::from_unix_timestamp_nanos(i128::from(created_at))
        .map_err(|e| StoreError::Serialization(e.to_string()))?;

    Ok(Post {
        id,
        author_id,
        content,
        created_at,
    })
}

#[async_trait]
impl PostStore for SqlitePostStore {
    async fn list_recent(&self, limit: usize) -> Result<Vec<Post>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows: Vec<PostRow> = sqlx::query_as(
            r#"
            SELECT id, author_id, content, created_at
            FROM posts
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(count = rows.len(), "Loaded recent posts");

        rows.into_iter().map(post_from_row).collect()
    }

    async fn insert(&self, author_id: &str, content: &str) -> Result<Post, StoreError> {
        let post = Post {
            id: Uuid::new_v4().to_string(),
            author_id: author_id.to_string(),
            content: content.to_string(),
            created_at: self.clock.now(),
        };

        let created_at = i64::try_from(post.created_at.unix_timestamp_nanos())
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query("INSERT INTO posts (id, author_id, content, created_at) VALUES (?, ?, ?, ?)")
            .bind(&post.id)
            .bind(&post.author_id)
            .bind(&post.content)
            .bind(created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(post)
    }
}
