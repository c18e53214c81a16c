/*
 * Responsibility
 * - Config読み込み → 依存生成 (stores / pipeline stages) → Router 組み立て
 * - Middleware の適用 (HTTP 横断 / identity / rate limit / role)
 * - rate limit store の定期 sweep を起動
 * - axum::serve() で起動
 */
use std::{panic, process, sync::Arc, time::Duration};

use anyhow::Result;
use axum::Router;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::repos::{account_repo::PgAccountStore, resource_repo::PgResourceCountStore};
use crate::services::{
    auth::{IdentityLoader, TokenVerifier},
    quota::QuotaEnforcer,
    rate_limit::{
        MemoryRateLimitStore, RateLimitRule, RateLimitStore, RateLimiter, ValkeyRateLimitStore,
    },
};
use crate::state::AppState;
use crate::{api, middleware};

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,access_gate=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    // Keep the default hook as a fallback (prints to stderr with location/payload).
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Always surface panics via tracing so they don't get "lost".
        tracing::error!(?info, "panic");

        // In development, fail fast. In production, let the server keep running.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting access gate in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    spawn_rate_limit_sweeper(
        state.rate_limiter.clone(),
        Duration::from_secs(config.rate_limit_sweep_interval_seconds),
    );

    let app = build_router(state, &config)?;

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("access gate stopped");
    Ok(())
}

async fn build_state(config: &Config) -> Result<AppState> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    let accounts = Arc::new(PgAccountStore::new(pool.clone()));
    let resources = Arc::new(PgResourceCountStore::new(pool));

    let verifier = Arc::new(TokenVerifier::new(
        config.jwt_secret.as_bytes(),
        config.access_token_leeway_seconds,
    ));
    let identities = Arc::new(IdentityLoader::new(accounts));
    let quota = Arc::new(QuotaEnforcer::new(
        resources,
        config.quota_unrecognized_feature,
    ));

    // Records are kept one extra window after they end, then swept (or expire).
    let retention = config.rate_limit_window;
    let store: Arc<dyn RateLimitStore> = match config.redis_url.as_deref() {
        Some(url) => Arc::new(ValkeyRateLimitStore::new(url, retention).await?),
        None => Arc::new(MemoryRateLimitStore::new(
            retention,
            config.rate_limit_max_entries,
        )),
    };

    let rule = RateLimitRule {
        max_requests: config.rate_limit_max_requests,
        window: config.rate_limit_window,
    };
    tracing::info!(
        backend = store.backend_name(),
        max_requests = rule.max_requests,
        window_seconds = rule.window.num_seconds(),
        "rate limiter configured"
    );
    let rate_limiter = Arc::new(RateLimiter::new(store, "api", rule));

    Ok(AppState::new(verifier, identities, quota, rate_limiter))
}

fn build_router(state: AppState, config: &Config) -> Result<Router> {
    let router = Router::new()
        .nest("/api/v1", api::v1::routes(state.clone())?)
        .with_state(state);

    Ok(middleware::http::apply(router, config))
}

/// Periodically drop rate-limit records that are past retention.
fn spawn_rate_limit_sweeper(limiter: Arc<RateLimiter>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately; nothing to sweep at startup.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match limiter.sweep(Utc::now()).await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "rate limit records swept"),
                Err(err) => tracing::warn!(error = %err, "rate limit sweep failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
