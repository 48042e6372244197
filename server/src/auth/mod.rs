//! Authentication Service
//!
//! Handles password login, token issuance and rotation, and session checks.

pub mod error;
mod handlers;
pub mod jwt;
mod middleware;
pub mod password;
pub mod tokens;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};

use crate::api::AppState;

pub use error::{AuthError, AuthResult, ErrorResponse};
pub use middleware::{parse_bearer, require_auth, AuthUser};
pub use tokens::{hash_token, SessionStore, TokenPair};

/// Create authentication router.
///
/// Public routes (no auth required):
/// - POST /register - Register a new user
/// - POST /login - Login with email/password
/// - POST /refresh - Rotate a refresh token
///
/// Protected routes (auth required):
/// - POST /logout - Revoke a refresh token
/// - GET /me - Get current user profile
/// - PUT /me - Update username
pub fn router(state: AppState) -> Router<AppState> {
    let public_routes = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh_token));

    let protected_routes = Router::new()
        .route("/logout", post(handlers::logout))
        .route("/me", get(handlers::get_profile).put(handlers::update_profile))
        .layer(axum_middleware::from_fn_with_state(state, require_auth));

    public_routes.merge(protected_routes)
}
