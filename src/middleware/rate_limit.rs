//! Per-identity rate limiting.
//!
//! Runs inside the identity layer: the key is always the authenticated
//! account. Requests without an identity are never throttled.
//!
//! Every request that reaches the limiter with an identity gets
//! `X-RateLimit-Limit`, `X-RateLimit-Remaining` and `X-RateLimit-Reset`
//! (RFC 3339, millisecond precision), whether it passes or is rejected.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};

use crate::api::v1::extractors::AuthCtx;
use crate::error::AppError;
use crate::services::rate_limit::{RateLimitDecision, RateLimitStatus, RateLimiter};
use crate::state::AppState;

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

pub fn apply(router: Router<AppState>, limiter: Arc<RateLimiter>) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
}

fn insert_headers(headers: &mut HeaderMap, status: &RateLimitStatus) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(status.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(status.remaining));
    let reset = status.reset_at.to_rfc3339_opts(SecondsFormat::Millis, true);
    if let Ok(v) = HeaderValue::from_str(&reset) {
        headers.insert(X_RATELIMIT_RESET, v);
    }
}

async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(user_id) = req.extensions().get::<AuthCtx>().map(AuthCtx::user_id) else {
        return next.run(req).await;
    };

    let decision = match limiter.check(user_id, Utc::now()).await {
        Ok(decision) => decision,
        Err(err) => return AppError::from(err).into_response(),
    };

    let mut response = match decision {
        RateLimitDecision::Allowed(_) => next.run(req).await,
        RateLimitDecision::Limited { retry_after, .. } => {
            tracing::warn!(%user_id, retry_after, "rate limit exceeded");
            AppError::RateLimited { retry_after }.into_response()
        }
    };

    insert_headers(response.headers_mut(), decision.status());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    #[test]
    fn reset_header_keeps_sub_second_precision() {
        let reset_at =
            Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap() + TimeDelta::milliseconds(500);
        let mut headers = HeaderMap::new();

        insert_headers(
            &mut headers,
            &RateLimitStatus {
                limit: 5,
                remaining: 2,
                reset_at,
            },
        );

        assert_eq!(headers[&X_RATELIMIT_LIMIT], "5");
        assert_eq!(headers[&X_RATELIMIT_REMAINING], "2");
        assert_eq!(headers[&X_RATELIMIT_RESET], "2026-01-02T03:04:05.500Z");
    }
}
