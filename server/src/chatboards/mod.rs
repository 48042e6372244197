//! Chatboards gated by squad, role and country grants.

pub mod handlers;
pub mod queries;
pub mod types;

use axum::{routing::get, Router};

use crate::api::AppState;

pub use types::{ChatboardError, CreateChatboardRequest, PendingUser};

/// Create the chatboard router. Mounted under `/api/chatboards` behind authentication.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_chatboards).post(handlers::create_chatboard),
        )
        .route("/{id}", get(handlers::get_chatboard))
        .route("/{id}/pending-users", get(handlers::pending_users))
}
