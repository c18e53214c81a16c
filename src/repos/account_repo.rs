/*
 * Responsibility
 * - accounts テーブル向け SQLx 操作 (read only)
 * - AccountStore trait の背後に Postgres 実装を置く (テストは in-memory 実装)
 * - 行 → Account への変換 (role / limits の検証込み)
 */
use std::{fmt, str::FromStr};

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repos::error::{RepoError, RepoResult};

/// Closed set of account roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(RepoError::InvalidRow(format!("unknown role '{other}'"))),
        }
    }
}

/// Per-tier feature limits. `None` means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierLimits {
    pub max_resources: Option<u32>,
    pub max_pdf_exports: Option<u32>,
    pub custom_branding: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tier {
    pub name: String,
    pub limits: TierLimits,
}

/// Usage counters owned by the account itself (incremented by the actions, not here).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageCounters {
    pub pdf_exports: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub role: Role,
    pub is_active: bool,
    pub tier: Tier,
    pub usage: UsageCounters,
}

/// Account lookup used by the identity stage.
#[async_trait]
pub trait AccountStore: Send + Sync + 'static {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Account>>;
}

#[derive(Debug, FromRow)]
struct AccountRow {
    id: Uuid,
    role: String,
    is_active: bool,
    tier_name: String,
    max_resources: Option<i32>,
    max_pdf_exports: Option<i32>,
    custom_branding: bool,
    pdf_exports_used: i32,
}

fn non_negative(column: &'static str, v: i32) -> RepoResult<u32> {
    u32::try_from(v).map_err(|_| RepoError::InvalidRow(format!("{column} is negative: {v}")))
}

impl TryFrom<AccountRow> for Account {
    type Error = RepoError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            id: row.id,
            role: row.role.parse()?,
            is_active: row.is_active,
            tier: Tier {
                name: row.tier_name,
                limits: TierLimits {
                    max_resources: row
                        .max_resources
                        .map(|v| non_negative("max_resources", v))
                        .transpose()?,
                    max_pdf_exports: row
                        .max_pdf_exports
                        .map(|v| non_negative("max_pdf_exports", v))
                        .transpose()?,
                    custom_branding: row.custom_branding,
                },
            },
            usage: UsageCounters {
                pdf_exports: non_negative("pdf_exports_used", row.pdf_exports_used)?,
            },
        })
    }
}

/// Postgres-backed account store.
///
/// Assumed schema (accounts join subscription_tiers):
/// - accounts.id (uuid), accounts.role (text), accounts.is_active (bool)
/// - accounts.pdf_exports_used (int)
/// - subscription_tiers.name, max_resources (int, nullable), max_pdf_exports (int, nullable),
///   custom_branding (bool)
#[derive(Clone, Debug)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT
                a.id,
                a.role,
                a.is_active,
                t.name AS tier_name,
                t.max_resources,
                t.max_pdf_exports,
                t.custom_branding,
                a.pdf_exports_used
            FROM accounts a
            JOIN subscription_tiers t ON t.id = a.tier_id
            WHERE a.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Account::try_from).transpose()
    }
}
