use std::sync::Arc;

use crate::api::v1::extractors::AuthCtx;
use crate::error::AppError;
use crate::repos::account_repo::AccountStore;
use crate::services::auth::token::VerifiedToken;

/// Resolves a verified token to a live account.
#[derive(Clone)]
pub struct IdentityLoader {
    accounts: Arc<dyn AccountStore>,
}

impl IdentityLoader {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    /// Exactly one account lookup. Callers keep the returned `AuthCtx` in the
    /// request extensions and never call this twice for the same request.
    pub async fn load(&self, token: VerifiedToken) -> Result<AuthCtx, AppError> {
        let account = self
            .accounts
            .find_by_id(token.user_id)
            .await?
            .ok_or(AppError::UnknownIdentity)?;

        if !account.is_active {
            return Err(AppError::InactiveAccount);
        }

        Ok(AuthCtx::new(account, token))
    }
}
