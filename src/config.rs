/*
 * Responsibility
 * - 環境変数や設定の読み込み (DATABASE_URL, JWT secret, rate limit, quota policy など)
 * - 設定値のバリデーション (不足・不正なら起動失敗)
 */
use std::net::SocketAddr;
use std::str::FromStr;

use chrono::TimeDelta;
use thiserror::Error;

use crate::services::quota::UnrecognizedFeaturePolicy;

const MIN_JWT_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub database_url: String,

    pub jwt_secret: String,
    pub access_token_leeway_seconds: u64,

    pub rate_limit_max_requests: u32,
    pub rate_limit_window: TimeDelta,
    pub rate_limit_sweep_interval_seconds: u64,
    pub rate_limit_max_entries: usize,
    pub redis_url: Option<String>,

    pub quota_unrecognized_feature: UnrecognizedFeaturePolicy,

    pub http_timeout_seconds: u64,
    pub http_body_limit_bytes: usize,
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<String, ConfigError> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn parsed_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port: u16 = parsed_or(&lookup, "PORT", 3000)?;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let app_env = AppEnv::parse(lookup("APP_ENV"));

        let database_url = required(&lookup, "DATABASE_URL")?;

        let jwt_secret = required(&lookup, "JWT_SECRET")?;
        if jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(ConfigError::Invalid("JWT_SECRET"));
        }

        let access_token_leeway_seconds = parsed_or(&lookup, "ACCESS_TOKEN_LEEWAY_SECONDS", 60)?;

        let rate_limit_max_requests = parsed_or(&lookup, "RATE_LIMIT_MAX_REQUESTS", 100)?;

        let window_seconds: i64 = parsed_or(&lookup, "RATE_LIMIT_WINDOW_SECONDS", 60)?;
        let rate_limit_window = TimeDelta::try_seconds(window_seconds)
            .filter(|w| *w > TimeDelta::zero())
            .ok_or(ConfigError::Invalid("RATE_LIMIT_WINDOW_SECONDS"))?;

        let rate_limit_sweep_interval_seconds: u64 =
            parsed_or(&lookup, "RATE_LIMIT_SWEEP_INTERVAL_SECONDS", 300)?;
        if rate_limit_sweep_interval_seconds == 0 {
            return Err(ConfigError::Invalid("RATE_LIMIT_SWEEP_INTERVAL_SECONDS"));
        }

        let rate_limit_max_entries = parsed_or(&lookup, "RATE_LIMIT_MAX_ENTRIES", 100_000)?;

        let redis_url = lookup("REDIS_URL").filter(|v| !v.trim().is_empty());

        let quota_unrecognized_feature = parsed_or(
            &lookup,
            "QUOTA_UNRECOGNIZED_FEATURE",
            UnrecognizedFeaturePolicy::Allow,
        )?;

        let http_timeout_seconds = parsed_or(&lookup, "HTTP_TIMEOUT_SECONDS", 30)?;
        let http_body_limit_bytes = parsed_or(&lookup, "HTTP_BODY_LIMIT_BYTES", 1024 * 1024)?;

        Ok(Self {
            addr,
            app_env,
            database_url,
            jwt_secret,
            access_token_leeway_seconds,
            rate_limit_max_requests,
            rate_limit_window,
            rate_limit_sweep_interval_seconds,
            rate_limit_max_entries,
            redis_url,
            quota_unrecognized_feature,
            http_timeout_seconds,
            http_body_limit_bytes,
        })
    }
}
