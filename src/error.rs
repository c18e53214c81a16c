/*
 * Responsibility
 * - アプリ共通の AppError 定義 (access pipeline の失敗分類 + Internal)
 * - IntoResponse 実装 (HTTP status / JSON envelope)
 * - 各 stage のエラー (TokenError / RepoError / RateLimitStoreError) を統一的に変換
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::repos::account_repo::Role;
use crate::repos::error::RepoError;
use crate::services::auth::token::TokenError;
use crate::services::rate_limit::RateLimitStoreError;

/// Failure envelope: `{ success: false, message, code, ...kind fields }`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("authentication required")]
    MissingCredential,
    #[error("invalid token")]
    MalformedOrInvalidCredential,
    #[error("token expired")]
    ExpiredCredential,
    #[error("account not found")]
    UnknownIdentity,
    #[error("account is deactivated")]
    InactiveAccount,
    #[error("not authenticated")]
    Unauthenticated,
    #[error("role '{role}' is not authorized to access this resource")]
    RoleForbidden { role: Role },
    #[error("quota exceeded for {feature} ({current}/{limit}), upgrade your plan to continue")]
    QuotaExceeded {
        feature: &'static str,
        limit: u32,
        current: u32,
    },
    #[error("{feature} is not included in your plan")]
    FeatureNotEntitled { feature: String },
    #[error("too many requests, retry in {retry_after} seconds")]
    RateLimited { retry_after: u64 },
    #[error("internal server error")]
    Internal,
}

impl AppError {
    /// Machine-readable kind, rendered as `code` in the envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::MissingCredential => "MISSING_CREDENTIAL",
            AppError::MalformedOrInvalidCredential => "MALFORMED_OR_INVALID_CREDENTIAL",
            AppError::ExpiredCredential => "EXPIRED_CREDENTIAL",
            AppError::UnknownIdentity => "UNKNOWN_IDENTITY",
            AppError::InactiveAccount => "INACTIVE_ACCOUNT",
            AppError::Unauthenticated => "UNAUTHENTICATED",
            AppError::RoleForbidden { .. } => "ROLE_FORBIDDEN",
            AppError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            AppError::FeatureNotEntitled { .. } => "FEATURE_NOT_ENTITLED",
            AppError::RateLimited { .. } => "RATE_LIMITED",
            AppError::Internal => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingCredential
            | AppError::MalformedOrInvalidCredential
            | AppError::ExpiredCredential
            | AppError::UnknownIdentity
            | AppError::InactiveAccount
            | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::RoleForbidden { .. }
            | AppError::QuotaExceeded { .. }
            | AppError::FeatureNotEntitled { .. } => StatusCode::FORBIDDEN,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn to_body(&self) -> ErrorResponse {
        let mut body = ErrorResponse {
            success: false,
            message: self.to_string(),
            code: self.code(),
            role: None,
            feature: None,
            limit: None,
            current: None,
            retry_after: None,
        };

        match self {
            AppError::RoleForbidden { role } => body.role = Some(*role),
            AppError::QuotaExceeded {
                feature,
                limit,
                current,
            } => {
                body.feature = Some(feature.to_string());
                body.limit = Some(*limit);
                body.current = Some(*current);
            }
            AppError::FeatureNotEntitled { feature } => body.feature = Some(feature.clone()),
            AppError::RateLimited { retry_after } => body.retry_after = Some(*retry_after),
            _ => {}
        }

        body
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = self.to_body();

        let mut res = (status, Json(body)).into_response();
        if let AppError::RateLimited { retry_after } = self {
            res.headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry_after.into());
        }
        res
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Missing => AppError::MissingCredential,
            TokenError::Expired => AppError::ExpiredCredential,
            TokenError::Invalid(_) => AppError::MalformedOrInvalidCredential,
        }
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        tracing::error!(error = %e, "store lookup failed");
        AppError::Internal
    }
}

impl From<RateLimitStoreError> for AppError {
    fn from(e: RateLimitStoreError) -> Self {
        tracing::error!(error = %e, "rate limit store failure");
        AppError::Internal
    }
}
