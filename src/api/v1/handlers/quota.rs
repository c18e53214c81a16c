/*
 * Responsibility
 * - POST /quota/{feature}/check
 * - action の前に呼ぶ preflight。通れば 204、超過なら 403 (limit/current 付き)
 * - usage の加算はここではしない (後続の action の責務)
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
};

use crate::{api::v1::extractors::AuthCtxExtractor, error::AppError, state::AppState};

pub async fn check_quota(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Path(feature): Path<String>,
) -> Result<StatusCode, AppError> {
    state.quota.check_named(&ctx.account, &feature).await?;
    Ok(StatusCode::NO_CONTENT)
}
