//! Cache client interface used by higher-level services (shared rate-limit state).
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-layer errors (transport/command/serialization).
///
/// Note:
/// - We keep this independent from `AppError` so callers can decide how to fail.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
    #[error("cache value error: {0}")]
    InvalidValue(String),
}

/// A minimal cache interface.
///
/// String-based on purpose: rate-limit records are stored as small JSON values,
/// and the only write primitives needed are insert-if-absent and compare-and-set.
///
/// Implementations must be cheap to clone (typically `Arc<...>` inside)
#[async_trait]
pub trait CacheClient: Clone + Send + Sync + 'static {
    // Returns the cache backend name (for logging).
    fn backend_name(&self) -> &'static str;

    // Get UTF-8 string value.
    async fn get_string(&self, key: &str) -> CacheResult<Option<String>>;

    // Set value if the key does not exist, with TTL.
    //
    // Returns:
    // - `Ok(true)`  if the key was set
    // - `Ok(false)` if the key already exists
    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<bool>;

    // Replace the value only if it currently equals `expected`, resetting the TTL.
    //
    // Returns:
    // - `Ok(true)`  if the value was replaced
    // - `Ok(false)` if the key is missing or holds something else
    async fn compare_and_set_with_ttl(
        &self,
        key: &str,
        expected: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<bool>;

    // Delete a key. Returns number of deleted keys.
    async fn del(&self, key: &str) -> CacheResult<u64>;
}
