/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth (identity / role), rate_limit, http (横断的な transport 設定)
 */
pub mod auth;
pub mod http;
pub mod rate_limit;
