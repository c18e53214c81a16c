use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use crate::services::{
    cache::{CacheClient, CacheError, ValkeyClient},
    rate_limit::store::{RateLimitRecord, RateLimitStore, RateLimitStoreError},
};

/// Valkey-backed rate-limit store (Redis protocol), shared across instances.
///
/// Records are JSON values with a PX TTL of "rest of the window + retention",
/// so the backend evicts them itself and `sweep` has nothing to do.
#[derive(Clone)]
pub struct ValkeyRateLimitStore<C: CacheClient> {
    cache: Arc<C>,
    // Optional key prefix to avoid collisions across environments
    prefix: String,
    retention: TimeDelta,
}

impl ValkeyRateLimitStore<ValkeyClient> {
    pub async fn new(redis_url: &str, retention: TimeDelta) -> Result<Self, RateLimitStoreError> {
        let client = ValkeyClient::new(redis_url).await?;
        Ok(Self::new_with_cache(
            Arc::new(client),
            "ratelimit",
            retention,
        ))
    }
}

impl<C: CacheClient> ValkeyRateLimitStore<C> {
    pub fn new_with_cache(cache: Arc<C>, prefix: impl Into<String>, retention: TimeDelta) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
            retention,
        }
    }

    pub fn key(&self, raw: &str) -> String {
        format!("{}:{}", self.prefix, raw)
    }

    fn encode(record: &RateLimitRecord) -> Result<String, RateLimitStoreError> {
        serde_json::to_string(record)
            .map_err(|e| CacheError::InvalidValue(e.to_string()).into())
    }

    fn ttl(&self, record: &RateLimitRecord, now: DateTime<Utc>) -> std::time::Duration {
        (record.reset_at - now + self.retention)
            .to_std()
            .unwrap_or_default()
    }
}

#[async_trait]
impl<C: CacheClient> RateLimitStore for ValkeyRateLimitStore<C> {
    fn backend_name(&self) -> &'static str {
        self.cache.backend_name()
    }

    async fn get(&self, key: &str) -> Result<Option<RateLimitRecord>, RateLimitStoreError> {
        let Some(raw) = self.cache.get_string(&self.key(key)).await? else {
            return Ok(None);
        };

        let record = serde_json::from_str(&raw)
            .map_err(|e| CacheError::InvalidValue(format!("{key}: {e}")))?;
        Ok(Some(record))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&RateLimitRecord>,
        new: &RateLimitRecord,
        now: DateTime<Utc>,
    ) -> Result<bool, RateLimitStoreError> {
        let full_key = self.key(key);
        let value = Self::encode(new)?;
        let ttl = self.ttl(new, now);

        let swapped = match expected {
            None => {
                self.cache
                    .set_if_absent_with_ttl(&full_key, &value, ttl)
                    .await?
            }
            Some(expected) => {
                let expected = Self::encode(expected)?;
                self.cache
                    .compare_and_set_with_ttl(&full_key, &expected, &value, ttl)
                    .await?
            }
        };

        Ok(swapped)
    }

    async fn remove(&self, key: &str) -> Result<bool, RateLimitStoreError> {
        Ok(self.cache.del(&self.key(key)).await? > 0)
    }

    async fn sweep(&self, _now: DateTime<Utc>) -> Result<usize, RateLimitStoreError> {
        // Expiry is delegated to key TTLs.
        Ok(0)
    }
}
