//! Rate limiter adapters

mod memory;
mod upstash;

pub use memory::InMemoryRateLimiter;
pub use upstash::{DEFAULT_PREFIX, UpstashRateLimiter};
