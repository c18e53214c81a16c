/*
 * Responsibility
 * - rate limit state の運用操作 (admin role のみ、RoleGate は route_layer で掛ける)
 * - POST /admin/rate-limits/sweep: retention を過ぎた record を削除
 * - DELETE /admin/rate-limits/{user_id}: 特定 identity の window をリセット
 */
use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    api::v1::{
        dto::access::{ResetResponse, SweepResponse},
        extractors::AuthCtxExtractor,
    },
    error::AppError,
    state::AppState,
};

pub async fn sweep_rate_limits(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
) -> Result<Json<SweepResponse>, AppError> {
    let removed = state.rate_limiter.sweep(Utc::now()).await?;
    tracing::info!(admin_id = %ctx.user_id(), removed, "rate limit sweep requested");

    Ok(Json(SweepResponse { removed }))
}

pub async fn reset_rate_limit(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ResetResponse>, AppError> {
    let removed = state.rate_limiter.reset(user_id).await?;
    tracing::info!(admin_id = %ctx.user_id(), %user_id, removed, "rate limit reset");

    Ok(Json(ResetResponse { user_id, removed }))
}
