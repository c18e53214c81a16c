//! RoleGate を route_layer として掛ける
//!
//! identity middleware (access::apply) より内側で動く前提。

use std::sync::Arc;

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
use crate::services::auth::role::RoleGate;
use crate::state::AppState;

/// Only the routes already registered on `router` are gated.
pub fn apply(router: Router<AppState>, gate: RoleGate) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(
        Arc::new(gate),
        role_middleware,
    ))
}

async fn role_middleware(
    State(gate): State<Arc<RoleGate>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    gate.check(req.extensions().get::<AuthCtx>())?;
    Ok(next.run(req).await)
}
