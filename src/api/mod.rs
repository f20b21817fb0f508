mod error;
mod sessions;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::session::Sessions;

/// Create the API router.
pub fn create_api_router(db: Database, jwt: Arc<JwtConfig>, secure_cookies: bool) -> Router {
    let sessions = Sessions::new(db.clone(), jwt.clone());

    let sessions_state = sessions::SessionsState {
        db: db.clone(),
        jwt: jwt.clone(),
        sessions,
        secure_cookies,
    };

    let users_state = users::UsersState {
        db,
        jwt,
        secure_cookies,
    };

    Router::new()
        .merge(sessions::router(sessions_state))
        .nest("/users", users::router(users_state))
}
