/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - access pipeline の組み立て: identity → rate limit → role → (handler 内で) quota
 *   - public:       /health (pipeline なし)
 *   - personalized: /entitlements (optional identity → rate limit)
 *   - private:      /me, /quota/{feature}/check, /admin/... (identity 必須 → rate limit → role)
 *
 * Notes
 * - axum の layer は後に掛けたものが外側。rate_limit::apply → access::apply の順で
 *   identity が先に走る
 * - RoleGate は route_layer なので admin router にだけ掛かる
 */
use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::api::v1::handlers::{
    accounts::{entitlements, me},
    admin::{reset_rate_limit, sweep_rate_limits},
    health::health,
    quota::check_quota,
};
use crate::middleware;
use crate::repos::account_repo::Role;
use crate::services::auth::{RoleGate, RoleGateError};
use crate::state::AppState;

pub fn routes(state: AppState) -> Result<Router<AppState>, RoleGateError> {
    let public = Router::new().route("/health", get(health));

    let personalized = Router::new().route("/entitlements", get(entitlements));
    let personalized = middleware::rate_limit::apply(personalized, state.rate_limiter.clone());
    let personalized = middleware::auth::access::apply_optional(personalized, state.clone());

    let admin = Router::new()
        .route("/admin/rate-limits/sweep", post(sweep_rate_limits))
        .route("/admin/rate-limits/{user_id}", delete(reset_rate_limit));
    let admin = middleware::auth::role::apply(admin, RoleGate::new(&[Role::Admin])?);

    let private = Router::new()
        .route("/me", get(me))
        .route("/quota/{feature}/check", post(check_quota))
        .merge(admin);
    let private = middleware::rate_limit::apply(private, state.rate_limiter.clone());
    let private = middleware::auth::access::apply(private, state.clone());

    Ok(Router::new()
        .merge(public)
        .merge(personalized)
        .merge(private)
        .with_state(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode, header},
        response::Response,
    };
    use chrono::TimeDelta;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::repos::account_repo::Account;
    use crate::services::{
        auth::{IdentityLoader, TokenVerifier},
        quota::{QuotaEnforcer, UnrecognizedFeaturePolicy},
        rate_limit::{MemoryRateLimitStore, RateLimitRule, RateLimiter},
    };
    use crate::test_support::{
        FixedResourceCounts, InMemoryAccounts, TEST_SECRET, account, sign_token,
    };

    struct Harness {
        app: Router,
        accounts: Arc<InMemoryAccounts>,
    }

    impl Harness {
        fn new(accounts: InMemoryAccounts, counts: FixedResourceCounts, max_requests: u32) -> Self {
            let accounts = Arc::new(accounts);
            let rule = RateLimitRule {
                max_requests,
                window: TimeDelta::seconds(60),
            };
            let store = Arc::new(MemoryRateLimitStore::new(TimeDelta::seconds(60), 1_000));
            let state = AppState::new(
                Arc::new(TokenVerifier::new(TEST_SECRET, 0)),
                Arc::new(IdentityLoader::new(accounts.clone())),
                Arc::new(QuotaEnforcer::new(
                    Arc::new(counts),
                    UnrecognizedFeaturePolicy::Allow,
                )),
                Arc::new(RateLimiter::new(store, "api", rule)),
            );
            let app = Router::new()
                .nest("/api/v1", routes(state.clone()).unwrap())
                .with_state(state);

            Self { app, accounts }
        }

        fn with_accounts(accounts: Vec<Account>) -> Self {
            Self::new(InMemoryAccounts::with(accounts), FixedResourceCounts::new(), 100)
        }

        async fn send(&self, method: Method, uri: &str, token: Option<&str>) -> Response {
            let mut req = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            self.app
                .clone()
                .oneshot(req.body(Body::empty()).unwrap())
                .await
                .unwrap()
        }
    }

    async fn json_body(res: Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn header_str<'a>(res: &'a Response, name: &str) -> Option<&'a str> {
        res.headers().get(name).and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn health_needs_no_credential() {
        let h = Harness::with_accounts(vec![]);

        let res = h.send(Method::GET, "/api/v1/health", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(h.accounts.lookups(), 0);
    }

    #[tokio::test]
    async fn missing_header_is_rejected_before_lookup() {
        let h = Harness::with_accounts(vec![]);

        let res = h.send(Method::GET, "/api/v1/me", None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(header_str(&res, "x-ratelimit-limit").is_none());

        let body = json_body(res).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "MISSING_CREDENTIAL");
        assert_eq!(h.accounts.lookups(), 0);
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let acc = account(Role::User);
        let h = Harness::with_accounts(vec![acc.clone()]);
        let token = sign_token(acc.id, -120);

        let res = h.send(Method::GET, "/api/v1/me", Some(&token)).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(res).await["code"], "EXPIRED_CREDENTIAL");
    }

    #[tokio::test]
    async fn inactive_account_is_rejected() {
        let mut acc = account(Role::User);
        acc.is_active = false;
        let h = Harness::with_accounts(vec![acc.clone()]);
        let token = sign_token(acc.id, 3600);

        let res = h.send(Method::GET, "/api/v1/me", Some(&token)).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(res).await["code"], "INACTIVE_ACCOUNT");
    }

    #[tokio::test]
    async fn me_resolves_account_once_and_reports_budget() {
        let acc = account(Role::User);
        let h = Harness::with_accounts(vec![acc.clone()]);
        let token = sign_token(acc.id, 3600);

        let res = h.send(Method::GET, "/api/v1/me", Some(&token)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(header_str(&res, "x-ratelimit-limit"), Some("100"));
        assert_eq!(header_str(&res, "x-ratelimit-remaining"), Some("99"));
        assert!(header_str(&res, "x-ratelimit-reset").is_some_and(|v| v.ends_with('Z')));

        let body = json_body(res).await;
        assert_eq!(body["id"], acc.id.to_string());
        assert_eq!(body["role"], "user");
        assert_eq!(body["tier"], "free");
        assert_eq!(h.accounts.lookups(), 1);
    }

    #[tokio::test]
    async fn store_failure_is_internal_error() {
        let h = Harness::new(InMemoryAccounts::failing(), FixedResourceCounts::new(), 100);
        let token = sign_token(Uuid::new_v4(), 3600);

        let res = h.send(Method::GET, "/api/v1/me", Some(&token)).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(res).await["code"], "INTERNAL_SERVER_ERROR");
    }

    #[tokio::test]
    async fn user_cannot_reach_admin_routes() {
        let acc = account(Role::User);
        let h = Harness::with_accounts(vec![acc.clone()]);
        let token = sign_token(acc.id, 3600);

        let res = h
            .send(Method::POST, "/api/v1/admin/rate-limits/sweep", Some(&token))
            .await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        // Rate limiting ran before the role gate.
        assert_eq!(header_str(&res, "x-ratelimit-remaining"), Some("99"));

        let body = json_body(res).await;
        assert_eq!(body["code"], "ROLE_FORBIDDEN");
        assert_eq!(body["role"], "user");
    }

    #[tokio::test]
    async fn admin_can_sweep() {
        let admin = account(Role::Admin);
        let h = Harness::with_accounts(vec![admin.clone()]);
        let token = sign_token(admin.id, 3600);

        let res = h
            .send(Method::POST, "/api/v1/admin/rate-limits/sweep", Some(&token))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["removed"], 0);
    }

    #[tokio::test]
    async fn quota_at_limit_is_forbidden() {
        let acc = account(Role::User);
        let counts = FixedResourceCounts::new().with(acc.id, 3);
        let h = Harness::new(InMemoryAccounts::with(vec![acc.clone()]), counts, 100);
        let token = sign_token(acc.id, 3600);

        let res = h
            .send(Method::POST, "/api/v1/quota/resource_creation/check", Some(&token))
            .await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let body = json_body(res).await;
        assert_eq!(body["code"], "QUOTA_EXCEEDED");
        assert_eq!(body["feature"], "resource_creation");
        assert_eq!(body["limit"], 3);
        assert_eq!(body["current"], 3);
    }

    #[tokio::test]
    async fn quota_under_limit_passes() {
        let acc = account(Role::User);
        let counts = FixedResourceCounts::new().with(acc.id, 2);
        let h = Harness::new(InMemoryAccounts::with(vec![acc.clone()]), counts, 100);
        let token = sign_token(acc.id, 3600);

        let res = h
            .send(Method::POST, "/api/v1/quota/resource_creation/check", Some(&token))
            .await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn capability_not_in_tier_is_forbidden() {
        let acc = account(Role::User);
        let h = Harness::with_accounts(vec![acc.clone()]);
        let token = sign_token(acc.id, 3600);

        let res = h
            .send(Method::POST, "/api/v1/quota/custom_branding/check", Some(&token))
            .await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(res).await["code"], "FEATURE_NOT_ENTITLED");
    }

    #[tokio::test]
    async fn over_budget_requests_get_429() {
        let acc = account(Role::User);
        let h = Harness::new(
            InMemoryAccounts::with(vec![acc.clone()]),
            FixedResourceCounts::new(),
            2,
        );
        let token = sign_token(acc.id, 3600);

        for remaining in ["1", "0"] {
            let res = h.send(Method::GET, "/api/v1/me", Some(&token)).await;
            assert_eq!(res.status(), StatusCode::OK);
            assert_eq!(header_str(&res, "x-ratelimit-remaining"), Some(remaining));
        }

        let res = h.send(Method::GET, "/api/v1/me", Some(&token)).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header_str(&res, "x-ratelimit-limit"), Some("2"));
        assert_eq!(header_str(&res, "x-ratelimit-remaining"), Some("0"));
        let retry_after: u64 = header_str(&res, "retry-after").unwrap().parse().unwrap();
        assert!((1..=60).contains(&retry_after));

        let body = json_body(res).await;
        assert_eq!(body["code"], "RATE_LIMITED");
        assert_eq!(body["retryAfter"], retry_after);
    }

    #[tokio::test]
    async fn admin_reset_restores_budget() {
        let user = account(Role::User);
        let admin = account(Role::Admin);
        let h = Harness::new(
            InMemoryAccounts::with(vec![user.clone(), admin.clone()]),
            FixedResourceCounts::new(),
            1,
        );
        let user_token = sign_token(user.id, 3600);
        let admin_token = sign_token(admin.id, 3600);

        assert_eq!(
            h.send(Method::GET, "/api/v1/me", Some(&user_token)).await.status(),
            StatusCode::OK
        );
        assert_eq!(
            h.send(Method::GET, "/api/v1/me", Some(&user_token)).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );

        let uri = format!("/api/v1/admin/rate-limits/{}", user.id);
        let res = h.send(Method::DELETE, &uri, Some(&admin_token)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["removed"], true);

        assert_eq!(
            h.send(Method::GET, "/api/v1/me", Some(&user_token)).await.status(),
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn entitlements_without_usable_credential_is_anonymous() {
        let acc = account(Role::User);
        let h = Harness::with_accounts(vec![acc.clone()]);
        let expired = sign_token(acc.id, -120);

        for token in [None, Some(expired.as_str()), Some("not-a-jwt")] {
            let res = h.send(Method::GET, "/api/v1/entitlements", token).await;
            assert_eq!(res.status(), StatusCode::OK);
            assert!(header_str(&res, "x-ratelimit-limit").is_none());

            let body = json_body(res).await;
            assert_eq!(body["authenticated"], false);
            assert!(body.get("tier").is_none());
        }
        assert_eq!(h.accounts.lookups(), 0);
    }

    #[tokio::test]
    async fn entitlements_with_credential_is_personalized_and_limited() {
        let acc = account(Role::User);
        let h = Harness::with_accounts(vec![acc.clone()]);
        let token = sign_token(acc.id, 3600);

        let res = h
            .send(Method::GET, "/api/v1/entitlements", Some(&token))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(header_str(&res, "x-ratelimit-remaining"), Some("99"));

        let body = json_body(res).await;
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["tier"], "free");
        assert_eq!(body["limits"]["max_resources"], 3);
        assert_eq!(h.accounts.lookups(), 1);
    }

    #[tokio::test]
    async fn optional_route_still_surfaces_store_failure() {
        let h = Harness::new(InMemoryAccounts::failing(), FixedResourceCounts::new(), 100);
        let token = sign_token(Uuid::new_v4(), 3600);

        let res = h
            .send(Method::GET, "/api/v1/entitlements", Some(&token))
            .await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
