//! chirp adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `store`: SQLite and in-memory post stores
//! - `identity`: Clerk and stub identity providers
//! - `ratelimit`: Upstash Redis and in-memory rate limiters

mod posts_memory;
mod posts_sqlite;

pub mod identity;
pub mod ratelimit;

/// Re-exports for post store adapters
pub mod store {
    pub use crate::posts_memory::InMemoryPostStore;
    pub use crate::posts_sqlite::SqlitePostStore;
}
