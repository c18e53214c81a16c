use axum::http::{HeaderMap, header};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use serde::Deserialize;
use uuid::Uuid;

/// Credential extraction / verification failures.
///
/// The three variants are the only outcomes callers branch on; the optional
/// identity stage swallows all of them.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("missing bearer credential")]
    Missing,
    #[error("invalid token: {0}")]
    Invalid(&'static str),
    #[error("token expired")]
    Expired,
}

/// Access token (JWT) claims as signed by the issuer.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

/// Verified token, converted into the types the pipeline works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub user_id: Uuid,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

/// Pull the token out of `Authorization: Bearer <token>`.
///
/// Absent header, non-ASCII value, another scheme or an empty token are all
/// `TokenError::Missing`: there is no bearer credential to judge.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, TokenError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(TokenError::Missing)?;

    let token = value.strip_prefix("Bearer ").ok_or(TokenError::Missing)?.trim();
    if token.is_empty() {
        return Err(TokenError::Missing);
    }

    Ok(token)
}

/// HS256 access-token verifier.
///
/// - Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("TokenVerifier")
            .field("validation", &self.validation)
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(secret: &[u8], leeway_seconds: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.validate_exp = true;
        validation.leeway = leeway_seconds;

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verify signature + `exp`, then promote `sub` to a UUID.
    ///
    /// jsonwebtoken checks the signature before any claim, so only a correctly
    /// signed token can come back as `Expired`.
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::Invalid("signature mismatch"),
                ErrorKind::MissingRequiredClaim(_) => TokenError::Invalid("missing claim"),
                _ => TokenError::Invalid("malformed token"),
            })?;

        let claims = data.claims;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| TokenError::Invalid("sub is not a uuid"))?;
        let expires_at =
            DateTime::from_timestamp(claims.exp, 0).ok_or(TokenError::Invalid("exp out of range"))?;
        let issued_at = claims.iat.and_then(|iat| DateTime::from_timestamp(iat, 0));

        Ok(VerifiedToken {
            user_id,
            issued_at,
            expires_at,
        })
    }

    /// Extraction + verification in one step.
    pub fn verify_headers(&self, headers: &HeaderMap) -> Result<VerifiedToken, TokenError> {
        let token = extract_bearer(headers)?;
        self.verify(token)
    }
}
