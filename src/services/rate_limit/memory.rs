use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use crate::services::rate_limit::store::{RateLimitRecord, RateLimitStore, RateLimitStoreError};

/// In-process rate-limit store.
///
/// One mutex guards the whole map, so compare-and-swap is trivially atomic.
/// State is per process: N instances each enforce their own limit.
///
/// Growth is bounded by `sweep` (run periodically by the app) and by a soft
/// `max_entries` cap: inserting past the cap sweeps inline first.
#[derive(Debug)]
pub struct MemoryRateLimitStore {
    records: Mutex<HashMap<String, RateLimitRecord>>,
    retention: TimeDelta,
    max_entries: usize,
}

impl MemoryRateLimitStore {
    pub fn new(retention: TimeDelta, max_entries: usize) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            retention,
            max_entries,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, RateLimitRecord>>, RateLimitStoreError> {
        self.records.lock().map_err(|_| RateLimitStoreError::Poisoned)
    }

    fn sweep_locked(
        records: &mut HashMap<String, RateLimitRecord>,
        retention: TimeDelta,
        now: DateTime<Utc>,
    ) -> usize {
        let before = records.len();
        records.retain(|_, r| r.reset_at + retention > now);
        before - records.len()
    }

    #[cfg(test)]
    pub fn len(&self) -> Result<usize, RateLimitStoreError> {
        Ok(self.lock()?.len())
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<RateLimitRecord>, RateLimitStoreError> {
        Ok(self.lock()?.get(key).copied())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&RateLimitRecord>,
        new: &RateLimitRecord,
        now: DateTime<Utc>,
    ) -> Result<bool, RateLimitStoreError> {
        let mut records = self.lock()?;

        if records.get(key) != expected {
            return Ok(false);
        }

        if expected.is_none() && records.len() >= self.max_entries {
            let removed = Self::sweep_locked(&mut records, self.retention, now);
            if records.len() >= self.max_entries {
                tracing::warn!(
                    entries = records.len(),
                    max_entries = self.max_entries,
                    removed,
                    "rate limit store over capacity after sweep"
                );
            }
        }

        records.insert(key.to_string(), *new);
        Ok(true)
    }

    async fn remove(&self, key: &str) -> Result<bool, RateLimitStoreError> {
        Ok(self.lock()?.remove(key).is_some())
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, RateLimitStoreError> {
        let mut records = self.lock()?;
        Ok(Self::sweep_locked(&mut records, self.retention, now))
    }
}
