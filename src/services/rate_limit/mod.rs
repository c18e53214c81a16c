pub mod limiter;
pub mod memory;
pub mod store;
pub mod valkey;

pub use limiter::{RateLimitDecision, RateLimitRule, RateLimitStatus, RateLimiter};
pub use memory::MemoryRateLimitStore;
pub use store::{RateLimitStore, RateLimitStoreError};
pub use valkey::ValkeyRateLimitStore;
