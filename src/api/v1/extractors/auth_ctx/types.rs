/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - identity middleware が検証 + account 解決して request extensions に格納し、handler はこの型だけを受け取る
 *
 * Notes
 * - token 検証 / account lookup は middleware/services 側の責務
 * - RoleGate / QuotaEnforcer はこの型を受け取るため、未認証の request に対して呼ばれることはない
 */

use uuid::Uuid;

use crate::repos::account_repo::Account;
use crate::services::auth::token::VerifiedToken;

/// 認証済みのリクエストに付与されるコンテキスト
///
/// - `account` は request ごとに 1 回だけ解決された account (request の間キャッシュされる)
/// - `token` は検証済み token の情報 (ログ相関用)
#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub account: Account,
    pub token: VerifiedToken,
}

impl AuthCtx {
    pub fn new(account: Account, token: VerifiedToken) -> Self {
        Self { account, token }
    }

    pub fn user_id(&self) -> Uuid {
        self.account.id
    }
}
