/*
 * Responsibility
 * - GET /me (identity 必須)
 * - GET /entitlements (optional identity: credential があれば tier を返す)
 */
use axum::Json;

use crate::api::v1::{
    dto::access::{AccountResponse, EntitlementsResponse},
    extractors::{AuthCtxExtractor, MaybeAuthCtx},
};

pub async fn me(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<AccountResponse> {
    Json(AccountResponse::from(&ctx.account))
}

pub async fn entitlements(MaybeAuthCtx(ctx): MaybeAuthCtx) -> Json<EntitlementsResponse> {
    let res = match ctx {
        Some(ctx) => EntitlementsResponse {
            authenticated: true,
            tier: Some(ctx.account.tier.name),
            limits: Some(ctx.account.tier.limits),
        },
        None => EntitlementsResponse {
            authenticated: false,
            tier: None,
            limits: None,
        },
    };

    Json(res)
}
