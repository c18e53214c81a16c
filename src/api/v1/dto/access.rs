/*
 * Responsibility
 * - access pipeline の状態を返す response DTO
 */
use serde::Serialize;
use uuid::Uuid;

use crate::repos::account_repo::{Account, Role, TierLimits, UsageCounters};

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub role: Role,
    pub tier: String,
    pub limits: TierLimits,
    pub usage: UsageCounters,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            role: account.role,
            tier: account.tier.name.clone(),
            limits: account.tier.limits.clone(),
            usage: account.usage.clone(),
        }
    }
}

/// Public view; personalized when the caller happened to send a usable credential.
#[derive(Debug, Serialize)]
pub struct EntitlementsResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<TierLimits>,
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub removed: usize,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub user_id: Uuid,
    pub removed: bool,
}
