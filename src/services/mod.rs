pub mod auth;
pub mod cache;
pub mod quota;
pub mod rate_limit;
