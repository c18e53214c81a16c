use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::cache::CacheError;

/// Per-identity fixed-window counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    pub count: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimitStoreError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("rate limit state lock poisoned")]
    Poisoned,
    #[error("rate limit record '{0}' kept changing under concurrent updates")]
    Contention(String),
}

/// Storage for rate-limit records.
///
/// Every write goes through `compare_and_swap`, which must be atomic per key:
/// the limiter relies on it to never admit two requests against one slot.
///
/// Each store owns its retention policy: records whose window ended more than
/// `retention` ago are dropped by `sweep` (or expire on their own where the
/// backend has TTLs).
#[async_trait]
pub trait RateLimitStore: Send + Sync + 'static {
    // Returns the store backend name (for logging).
    fn backend_name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<RateLimitRecord>, RateLimitStoreError>;

    // Replace `expected` with `new` atomically.
    //
    // `expected = None` means "only if no record exists".
    // Returns:
    // - Ok(true)  => swapped
    // - Ok(false) => the stored value differs from `expected` (caller re-reads)
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&RateLimitRecord>,
        new: &RateLimitRecord,
        now: DateTime<Utc>,
    ) -> Result<bool, RateLimitStoreError>;

    // Drop one record. Returns whether something was removed.
    async fn remove(&self, key: &str) -> Result<bool, RateLimitStoreError>;

    // Drop records past retention. Returns the number removed.
    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, RateLimitStoreError>;
}
