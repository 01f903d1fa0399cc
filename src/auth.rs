use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderName, header, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::AccountId,
    repository::RepositoryState,
};

/// Header carrying the raw session token, as sent by the browser client.
pub const AUTH_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-auth-token");

/// Tokens expire this many hours after issuance and cannot be refreshed.
pub const TOKEN_TTL_HOURS: i64 = 24;

/// Claims
///
/// The payload signed into every session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the account the token was issued to.
    pub sub: AccountId,
    /// Expiration Time (exp): seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat): seconds since the epoch.
    pub iat: usize,
}

/// JwtKeys
///
/// The Identity Verifier. Built once from the configured secret and shared through the
/// application state; issuing and verifying are pure functions of these keys and the clock.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Mints a token for `account` valid for `TOKEN_TTL_HOURS` from now.
    pub fn issue(&self, account: AccountId) -> AppResult<String> {
        self.issue_at(account, Utc::now())
    }

    /// Mints a token as if it had been issued at `issued_at`.
    pub fn issue_at(&self, account: AccountId, issued_at: DateTime<Utc>) -> AppResult<String> {
        let expires_at = issued_at + Duration::hours(TOKEN_TTL_HOURS);
        let claims = Claims {
            sub: account,
            iat: issued_at.timestamp().max(0) as usize,
            exp: expires_at.timestamp().max(0) as usize,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Storage(format!("failed to sign token: {e}")))
    }

    /// Verifies signature and expiry and returns the account the token was issued to.
    ///
    /// Every failure (malformed, bad signature, expired) collapses to `Unauthenticated`.
    pub fn verify(&self, token: &str) -> AppResult<AccountId> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims.sub)
            .map_err(|e| {
                tracing::debug!(reason = ?e.kind(), "token rejected");
                AppError::Unauthenticated
            })
    }
}

/// Pulls the raw token out of `x-auth-token`, falling back to `Authorization: Bearer`.
pub fn token_from_parts(parts: &Parts) -> Option<&str> {
    if let Some(token) = parts
        .headers
        .get(AUTH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        return Some(token.trim()).filter(|t| !t.is_empty());
    }

    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// AuthUser
///
/// The principal: the verified identity behind one request. Services take it as proof that
/// the caller is authenticated and compare `id` for ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: AccountId,
}

/// AuthUser Extractor Implementation
///
/// 0. Reuses a principal already placed in the request extensions.
/// 1. Reads the token from the request headers.
/// 2. Verifies it with the shared `JwtKeys`.
/// 3. Confirms the account still exists, so a token for a deleted account is rejected.
///
/// Rejection: `AppError::Unauthenticated` (401) on any failure, `Storage` if the lookup fails.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Already resolved by the router's auth middleware.
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(*user);
        }

        let repo = RepositoryState::from_ref(state);
        let keys = JwtKeys::from_ref(state);

        let token = token_from_parts(parts).ok_or(AppError::Unauthenticated)?;
        let account_id = keys.verify(token)?;

        match repo.find_account(account_id).await? {
            Some(account) => Ok(AuthUser { id: account.id }),
            None => {
                tracing::warn!(account_id = %account_id, "token references a missing account");
                Err(AppError::Unauthenticated)
            }
        }
    }
}
