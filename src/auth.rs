//! Request authentication for API routes.
//!
//! The access gate is stateless: it validates the presented access token
//! against the codec and loads the account, but never reads the refresh-token
//! slot. A logged-out account's access tokens therefore keep working until
//! they expire naturally; only the refresh path consults storage.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
    response::{IntoResponse, Response},
};

use crate::db::{AccountProfile, Database};
use crate::jwt::{Claims, JwtConfig};

/// Cookie name for the access token (short-lived).
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Cookie name for the refresh token (long-lived).
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Extract a bearer token from the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Build a Set-Cookie string for a token cookie.
pub fn token_cookie(name: &str, value: &str, max_age_secs: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}",
        name, value, max_age_secs, secure
    )
}

/// Build a Set-Cookie string that clears a token cookie.
pub fn clear_cookie(name: &str, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0{}",
        name, secure
    )
}

/// Authenticated account information extracted from an access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount {
    /// Claims from the access token
    pub claims: Claims,
    /// Database account ID
    pub account_id: i64,
    /// Sanitized account projection (no password hash, no refresh token)
    pub profile: AccountProfile,
}

/// API authentication errors (returned as JSON).
#[derive(Debug)]
pub enum ApiAuthError {
    MissingToken,
    InvalidToken,
    DatabaseError,
}

impl ApiAuthError {
    fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::MissingToken | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Self::MissingToken => "Missing token",
            Self::InvalidToken => "Invalid token",
            Self::DatabaseError => "Database error",
        }
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        use axum::Json;
        use serde::Serialize;

        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}

/// Trait for state types that support API authentication.
pub trait HasAuthState {
    fn jwt(&self) -> &JwtConfig;
    fn db(&self) -> &Database;
    fn secure_cookies(&self) -> bool;
}

/// Macro to implement `HasAuthState` for state structs with the standard
/// fields `db: Database`, `jwt: Arc<JwtConfig>`, `secure_cookies: bool`.
#[macro_export]
macro_rules! impl_has_auth_state {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthState for $state_type {
            fn jwt(&self) -> &$crate::jwt::JwtConfig {
                &self.jwt
            }
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
            fn secure_cookies(&self) -> bool {
                self.secure_cookies
            }
        }
    };
}

/// Extractor for API endpoints that require authentication.
///
/// Token source precedence: `access_token` cookie, then `Authorization:
/// Bearer`. Validates signature and expiry only; does not touch the
/// refresh-token slot.
pub struct ApiAuth(pub AuthenticatedAccount);

impl<S> FromRequestParts<S> for ApiAuth
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = get_cookie(&parts.headers, ACCESS_COOKIE_NAME)
            .or_else(|| bearer_token(&parts.headers))
            .filter(|t| !t.is_empty())
            .ok_or(ApiAuthError::MissingToken)?;

        let claims = state
            .jwt()
            .verify_access(token)
            .map_err(|_| ApiAuthError::InvalidToken)?;

        // The account may have been deleted after the token was issued
        let account = state
            .db()
            .accounts()
            .get_by_uuid(&claims.sub)
            .await
            .map_err(|e| {
                tracing::error!("Failed to load account: {}", e);
                ApiAuthError::DatabaseError
            })?
            .ok_or(ApiAuthError::InvalidToken)?;

        Ok(ApiAuth(AuthenticatedAccount {
            claims,
            account_id: account.id,
            profile: account.profile(),
        }))
    }
}
