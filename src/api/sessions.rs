//! Session API endpoints.
//!
//! - POST `/login` - Verify credentials, issue a token pair, set cookies
//! - POST `/logout` - Clear the refresh slot and both cookies
//! - POST `/refresh-token` - Rotate a refresh token into a new pair

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use crate::auth::{
    ACCESS_COOKIE_NAME, ApiAuth, REFRESH_COOKIE_NAME, clear_cookie, get_cookie, token_cookie,
};
use crate::db::{AccountProfile, Database};
use crate::impl_has_auth_state;
use crate::jwt::JwtConfig;
use crate::session::{Sessions, TokenPair};

#[derive(Clone)]
pub struct SessionsState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub sessions: Sessions,
    pub secure_cookies: bool,
}

impl_has_auth_state!(SessionsState);

pub fn router(state: SessionsState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh-token", post(refresh_token))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    #[serde(default)]
    username_or_email: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    user: AccountProfile,
    access_token: String,
    refresh_token: String,
}

/// Both tokens travel in the body and as HttpOnly cookies.
fn pair_cookies(pair: &TokenPair, secure: bool) -> AppendHeaders<[(axum::http::HeaderName, String); 2]> {
    AppendHeaders([
        (
            SET_COOKIE,
            token_cookie(ACCESS_COOKIE_NAME, &pair.access_token, pair.access_ttl, secure),
        ),
        (
            SET_COOKIE,
            token_cookie(
                REFRESH_COOKIE_NAME,
                &pair.refresh_token,
                pair.refresh_ttl,
                secure,
            ),
        ),
    ])
}

/// Verify credentials and open a session. Issuing the pair overwrites any
/// refresh token a previous login left in the slot.
async fn login(
    State(state): State<SessionsState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .sessions
        .authenticate(&payload.username_or_email, &payload.password)
        .await?;

    let pair = state.sessions.issue_tokens(&account).await?;

    Ok((
        StatusCode::OK,
        pair_cookies(&pair, state.secure_cookies),
        Json(LoginResponse {
            user: account.profile(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }),
    ))
}

/// Close the current session and clear both cookies. Requires a valid
/// access token; the still-unexpired access token keeps working elsewhere
/// until it expires.
async fn logout(
    State(state): State<SessionsState>,
    ApiAuth(auth): ApiAuth,
) -> Result<impl IntoResponse, ApiError> {
    state.sessions.logout(auth.account_id).await?;

    let secure = state.secure_cookies;
    Ok((
        StatusCode::OK,
        AppendHeaders([
            (SET_COOKIE, clear_cookie(ACCESS_COOKIE_NAME, secure)),
            (SET_COOKIE, clear_cookie(REFRESH_COOKIE_NAME, secure)),
        ]),
        Json(serde_json::json!({ "success": true })),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    #[serde(default)]
    refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
}

/// Exchange a refresh token for a new pair. The token comes from the
/// refresh cookie or the request body; any validation failure is a 401.
async fn refresh_token(
    State(state): State<SessionsState>,
    request: axum::extract::Request,
) -> Result<impl IntoResponse, ApiError> {
    let (parts, body) = request.into_parts();

    let presented = match get_cookie(&parts.headers, REFRESH_COOKIE_NAME) {
        Some(token) => token.to_string(),
        None => {
            // Fall back to the body field; an unreadable body is just a
            // missing token, not a 400
            let bytes = axum::body::to_bytes(body, 64 * 1024)
                .await
                .unwrap_or_default();
            serde_json::from_slice::<RefreshRequest>(&bytes)
                .map(|r| r.refresh_token)
                .unwrap_or_default()
        }
    };

    let (_, pair) = state.sessions.refresh(&presented).await?;

    Ok((
        StatusCode::OK,
        pair_cookies(&pair, state.secure_cookies),
        Json(RefreshResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }),
    ))
}
