//! Squad membership, role and country grants, and the catalogs they reference.

pub mod handlers;
pub mod queries;
pub mod types;

use axum::{
    routing::{get, post},
    Router,
};

use crate::api::AppState;

pub use types::{MembershipError, Profile, SquadMembership};

/// Create the membership router. Mounted under `/api` behind authentication.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/roles", get(handlers::list_roles).post(handlers::create_role))
        .route("/roles/assign", post(handlers::assign_role))
        .route("/squads", get(handlers::list_squads).post(handlers::create_squad))
        .route("/squads/{squad_id}/join", post(handlers::join_squad))
        .route(
            "/countries",
            get(handlers::list_countries).post(handlers::create_country),
        )
        .route("/me/squads", get(handlers::list_my_squads))
        .route("/me/countries", post(handlers::add_my_country))
        .route("/verification", post(handlers::verify_membership))
}
