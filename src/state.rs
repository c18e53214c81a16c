/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - access pipeline の各 stage: verifier / identities / quota / rate_limiter
 * - Clone 前提で持つ (内部は Arc で Clone cheap)
 */
use std::sync::Arc;

use crate::services::{
    auth::{identity::IdentityLoader, token::TokenVerifier},
    quota::QuotaEnforcer,
    rate_limit::RateLimiter,
};

#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<TokenVerifier>,
    pub identities: Arc<IdentityLoader>,
    pub quota: Arc<QuotaEnforcer>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        verifier: Arc<TokenVerifier>,
        identities: Arc<IdentityLoader>,
        quota: Arc<QuotaEnforcer>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            verifier,
            identities,
            quota,
            rate_limiter,
        }
    }
}
