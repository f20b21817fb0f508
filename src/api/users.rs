//! Account API endpoints.
//!
//! - POST `/` - Register a new account
//! - GET `/me` - Current account profile
//! - POST `/change-password` - Change the authenticated account's password

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use crate::auth::ApiAuth;
use crate::db::{AccountProfile, Database};
use crate::impl_has_auth_state;
use crate::jwt::JwtConfig;
use crate::password;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
}

impl_has_auth_state!(UsersState);

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/", post(register))
        .route("/me", get(me))
        .route("/change-password", post(change_password))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    user: AccountProfile,
}

async fn register(
    State(state): State<UsersState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let full_name = payload.full_name.trim();
    let email = payload.email.trim();
    let username = payload.username.trim().to_lowercase();

    if full_name.is_empty() || email.is_empty() || username.is_empty() || payload.password.is_empty()
    {
        return Err(ApiError::bad_request("All fields are required"));
    }

    if username.len() > 32 {
        return Err(ApiError::bad_request(
            "Username cannot be longer than 32 characters",
        ));
    }

    // Only allow alphanumeric and underscores
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ApiError::bad_request(
            "Username can only contain letters, numbers, and underscores",
        ));
    }

    if !email.contains('@') {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    if state
        .db
        .accounts()
        .get_by_username(&username)
        .await
        .db_err("Failed to check username")?
        .is_some()
        || state
            .db
            .accounts()
            .get_by_email(email)
            .await
            .db_err("Failed to check email")?
            .is_some()
    {
        return Err(ApiError::conflict(
            "User with this username or email already exists",
        ));
    }

    let hash = password::hash_password(&payload.password)
        .map_err(|e| ApiError::db_error("Failed to hash password", e))?;

    let uuid = uuid::Uuid::new_v4().to_string();
    let id = state
        .db
        .accounts()
        .create(&uuid, &username, email, full_name, &hash)
        .await
        .db_err("Failed to create account")?;

    let account = state
        .db
        .accounts()
        .get_by_id(id)
        .await
        .db_err("Failed to load account")?
        .ok_or_else(|| ApiError::internal("Account vanished after creation"))?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: account.profile(),
        }),
    ))
}

#[derive(Serialize)]
struct MeResponse {
    user: AccountProfile,
}

async fn me(ApiAuth(auth): ApiAuth) -> impl IntoResponse {
    Json(MeResponse { user: auth.profile })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    #[serde(default)]
    old_password: String,
    #[serde(default)]
    new_password: String,
}

/// Change the password of the currently authenticated account. Does not
/// rotate the refresh slot; open sessions stay open.
async fn change_password(
    State(state): State<UsersState>,
    ApiAuth(auth): ApiAuth,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.new_password.is_empty() {
        return Err(ApiError::bad_request("New password is required"));
    }

    let account = state
        .db
        .accounts()
        .get_by_id(auth.account_id)
        .await
        .db_err("Failed to load account")?
        .ok_or_else(|| ApiError::unauthorized("Invalid token"))?;

    if !password::verify_password(&payload.old_password, &account.password_hash) {
        return Err(ApiError::unauthorized("Invalid old password"));
    }

    let hash = password::hash_password(&payload.new_password)
        .map_err(|e| ApiError::db_error("Failed to hash password", e))?;

    state
        .db
        .accounts()
        .set_password_hash(account.id, &hash)
        .await
        .db_err("Failed to update password")?;

    Ok((StatusCode::OK, Json(serde_json::json!({ "success": true }))))
}
