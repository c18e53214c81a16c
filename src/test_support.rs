//! Fakes and fixtures shared by the unit tests.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use uuid::Uuid;

use crate::api::v1::extractors::AuthCtx;
use crate::repos::account_repo::{Account, AccountStore, Role, Tier, TierLimits, UsageCounters};
use crate::repos::error::{RepoError, RepoResult};
use crate::repos::resource_repo::ResourceCountStore;
use crate::services::auth::token::VerifiedToken;
use crate::services::cache::{CacheClient, client::CacheResult};

pub const TEST_SECRET: &[u8] = b"test-secret-key-for-hs256-signing-0123";

pub fn sign_claims<T: Serialize>(secret: &[u8], claims: &T) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .unwrap()
}

/// Token for `user_id` expiring `ttl_secs` from now (negative = already expired).
pub fn sign_token_with(secret: &[u8], user_id: Uuid, ttl_secs: i64) -> String {
    let now = Utc::now().timestamp();
    sign_claims(
        secret,
        &serde_json::json!({
            "sub": user_id.to_string(),
            "iat": now,
            "exp": now + ttl_secs,
        }),
    )
}

pub fn sign_token(user_id: Uuid, ttl_secs: i64) -> String {
    sign_token_with(TEST_SECRET, user_id, ttl_secs)
}

pub fn account(role: Role) -> Account {
    Account {
        id: Uuid::new_v4(),
        role,
        is_active: true,
        tier: Tier {
            name: "free".to_string(),
            limits: TierLimits {
                max_resources: Some(3),
                max_pdf_exports: Some(10),
                custom_branding: false,
            },
        },
        usage: UsageCounters::default(),
    }
}

pub fn auth_ctx(role: Role) -> AuthCtx {
    let account = account(role);
    let token = VerifiedToken {
        user_id: account.id,
        issued_at: Some(Utc::now()),
        expires_at: Utc::now() + TimeDelta::hours(1),
    };
    AuthCtx::new(account, token)
}

#[derive(Default)]
pub struct InMemoryAccounts {
    accounts: HashMap<Uuid, Account>,
    fail: bool,
    lookups: AtomicUsize,
}

impl InMemoryAccounts {
    pub fn with(accounts: Vec<Account>) -> Self {
        Self {
            accounts: accounts.into_iter().map(|a| (a.id, a)).collect(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountStore for InMemoryAccounts {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Account>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RepoError::Db(sqlx::Error::PoolTimedOut));
        }
        Ok(self.accounts.get(&id).cloned())
    }
}

#[derive(Default)]
pub struct FixedResourceCounts {
    counts: HashMap<Uuid, u32>,
    fail: bool,
}

impl FixedResourceCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, owner_id: Uuid, count: u32) -> Self {
        self.counts.insert(owner_id, count);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ResourceCountStore for FixedResourceCounts {
    async fn count_owned_by(&self, owner_id: Uuid) -> RepoResult<u32> {
        if self.fail {
            return Err(RepoError::Db(sqlx::Error::PoolTimedOut));
        }
        Ok(self.counts.get(&owner_id).copied().unwrap_or(0))
    }
}

/// HashMap-backed `CacheClient`; TTLs are ignored.
#[derive(Clone, Default)]
pub struct MemoryCache {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryCache {
    pub fn contains(&self, key: &str) -> bool {
        self.values.lock().unwrap().contains_key(key)
    }

    pub fn put(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    fn backend_name(&self) -> &'static str {
        "memory-cache"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &str,
        _ttl: Duration,
    ) -> CacheResult<bool> {
        let mut values = self.values.lock().unwrap();
        if values.contains_key(key) {
            return Ok(false);
        }
        values.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn compare_and_set_with_ttl(
        &self,
        key: &str,
        expected: &str,
        value: &str,
        _ttl: Duration,
    ) -> CacheResult<bool> {
        let mut values = self.values.lock().unwrap();
        match values.get(key) {
            Some(current) if current == expected => {
                values.insert(key.to_string(), value.to_string());
                Ok(true)
            }
            Some(_) | None => Ok(false),
        }
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        Ok(u64::from(self.values.lock().unwrap().remove(key).is_some()))
    }
}
