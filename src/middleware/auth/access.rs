//! Bearer token 検証 → account 解決 → AuthCtx を extensions に入れる
//!
//! - `apply`: 必須。失敗したらその場で terminal response を返す
//! - `apply_optional`: credential の不備は「identity なし」として先に進める
//!
//! どちらも、既に AuthCtx が extensions にあれば何もしない (account lookup は request ごとに 1 回)

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::api::v1::extractors::AuthCtx;
use crate::error::AppError;
use crate::services::auth::token::TokenError;
use crate::state::AppState;

/// 認証必須の router に identity middleware を適用する。
///
/// 例：
/// ```ignore
/// let private = middleware::rate_limit::apply(private, state.rate_limiter.clone());
/// let private = middleware::auth::access::apply(private, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

/// public route 用。credential があれば identity を付け、無効なら付けずに通す。
pub fn apply_optional(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(
        state,
        optional_access_middleware,
    ))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if req.extensions().get::<AuthCtx>().is_some() {
        return Ok(next.run(req).await);
    }

    let token = match state.verifier.verify_headers(req.headers()) {
        Ok(token) => token,
        Err(err) => {
            tracing::warn!(error = %err, "access token verification failed");
            return Err(err.into());
        }
    };

    let user_id = token.user_id;
    let auth_ctx = match state.identities.load(token).await {
        Ok(ctx) => ctx,
        Err(err) => {
            tracing::warn!(%user_id, error = %err, "identity resolution failed");
            return Err(err);
        }
    };

    tracing::debug!(
        %user_id,
        expires_at = %auth_ctx.token.expires_at,
        "identity attached"
    );

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(auth_ctx);

    Ok(next.run(req).await)
}

async fn optional_access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if req.extensions().get::<AuthCtx>().is_some() {
        return Ok(next.run(req).await);
    }

    match state.verifier.verify_headers(req.headers()) {
        Ok(token) => {
            let user_id = token.user_id;
            match state.identities.load(token).await {
                Ok(ctx) => {
                    tracing::debug!(
                        %user_id,
                        expires_at = %ctx.token.expires_at,
                        "optional identity attached"
                    );
                    req.extensions_mut().insert(ctx);
                }
                // Store failures are not identity problems; do not hide them.
                Err(AppError::Internal) => return Err(AppError::Internal),
                Err(err) => {
                    tracing::debug!(%user_id, error = %err, "continuing without identity");
                }
            }
        }
        Err(TokenError::Missing) => {}
        Err(err) => {
            tracing::debug!(error = %err, "ignoring unusable credential");
        }
    }

    Ok(next.run(req).await)
}
