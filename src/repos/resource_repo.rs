/*
 * Responsibility
 * - resources テーブルの所有数カウント (quota 判定用)
 * - ResourceCountStore trait の背後に Postgres 実装を置く
 */
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::repos::error::{RepoError, RepoResult};

#[async_trait]
pub trait ResourceCountStore: Send + Sync + 'static {
    /// Number of resources currently owned by `owner_id`.
    async fn count_owned_by(&self, owner_id: Uuid) -> RepoResult<u32>;
}

#[derive(Clone, Debug)]
pub struct PgResourceCountStore {
    pool: PgPool,
}

impl PgResourceCountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceCountStore for PgResourceCountStore {
    async fn count_owned_by(&self, owner_id: Uuid) -> RepoResult<u32> {
        let n = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM resources
            WHERE owner_id = $1
            "#,
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        u32::try_from(n).map_err(|_| RepoError::InvalidRow(format!("resource count out of range: {n}")))
    }
}
