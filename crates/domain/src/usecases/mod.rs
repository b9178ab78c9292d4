//! Application use cases / business logic

pub mod posts;

pub use posts::{Dependency, ErrorCode, PostsError, PostsService, RECENT_POSTS_LIMIT};
