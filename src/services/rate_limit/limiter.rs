use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use crate::services::rate_limit::store::{RateLimitRecord, RateLimitStore, RateLimitStoreError};

const MAX_SWAP_ATTEMPTS: usize = 32;

/// Rate limit rule: requests per fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub max_requests: u32,
    pub window: TimeDelta,
}

/// Values surfaced as `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed(RateLimitStatus),
    Limited {
        status: RateLimitStatus,
        // Whole seconds until the window resets, rounded up (always >= 1).
        retry_after: u64,
    },
}

impl RateLimitDecision {
    pub fn status(&self) -> &RateLimitStatus {
        match self {
            RateLimitDecision::Allowed(status) => status,
            RateLimitDecision::Limited { status, .. } => status,
        }
    }
}

/// Per-identity fixed-window limiter over an injectable store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    scope: String,
    rule: RateLimitRule,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("backend", &self.store.backend_name())
            .field("scope", &self.scope)
            .field("rule", &self.rule)
            .finish()
    }
}

fn retry_after_secs(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (reset_at - now).num_milliseconds().max(0);
    u64::try_from((millis + 999) / 1000).unwrap_or(0).max(1)
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, scope: impl Into<String>, rule: RateLimitRule) -> Self {
        Self {
            store,
            scope: scope.into(),
            rule,
        }
    }

    fn key(&self, user_id: Uuid) -> String {
        format!("{}:{}", self.scope, user_id)
    }

    /// Count one request from `user_id` at `now`.
    ///
    /// Read, decide, then compare-and-swap against what was read; a lost swap
    /// means another request for the same identity got in first, so re-read.
    /// A rejected request never writes.
    pub async fn check(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, RateLimitStoreError> {
        let key = self.key(user_id);
        let max = self.rule.max_requests;

        for _ in 0..MAX_SWAP_ATTEMPTS {
            let stored = self.store.get(&key).await?;

            let current = match stored {
                Some(record) if now < record.reset_at => record,
                // No record yet, or the window is over: start a fresh one.
                _ => RateLimitRecord {
                    count: 0,
                    reset_at: now + self.rule.window,
                },
            };

            if current.count >= max {
                return Ok(RateLimitDecision::Limited {
                    status: RateLimitStatus {
                        limit: max,
                        remaining: 0,
                        reset_at: current.reset_at,
                    },
                    retry_after: retry_after_secs(current.reset_at, now),
                });
            }

            let next = RateLimitRecord {
                count: current.count + 1,
                reset_at: current.reset_at,
            };

            if self
                .store
                .compare_and_swap(&key, stored.as_ref(), &next, now)
                .await?
            {
                return Ok(RateLimitDecision::Allowed(RateLimitStatus {
                    limit: max,
                    remaining: max - next.count,
                    reset_at: next.reset_at,
                }));
            }

            tokio::task::yield_now().await;
        }

        Err(RateLimitStoreError::Contention(key))
    }

    /// Forget one identity's window.
    pub async fn reset(&self, user_id: Uuid) -> Result<bool, RateLimitStoreError> {
        self.store.remove(&self.key(user_id)).await
    }

    /// Drop records past the store's retention.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, RateLimitStoreError> {
        self.store.sweep(now).await
    }
}
