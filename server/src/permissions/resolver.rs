//! Access resolution logic.
//!
//! Decides whether a user's grants unlock a chatboard. Pure functions only;
//! loading grants lives in [`super::queries`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use super::models::{AccessSpec, GrantPath, UserGrants, COARSE_ROLES};
use crate::auth::error::ErrorResponse;

/// Resolve which path, if any, grants access to a chatboard.
///
/// Resolution order:
/// 1. Squad path: an approved membership in a listed squad
/// 2. Role path: a global role, or a role held in an approved squad
/// 3. Country path: an associated listed country
///
/// The order only decides which path is reported; access is the OR of all three.
#[must_use]
pub fn resolve_access(grants: &UserGrants, spec: &AccessSpec) -> Option<GrantPath> {
    if spec.squad_ids.iter().any(|id| grants.is_approved_in(*id)) {
        return Some(GrantPath::Squad);
    }

    if !spec.role_ids.is_empty() {
        let roles = grants.effective_roles();
        if spec.role_ids.iter().any(|id| roles.contains(id)) {
            return Some(GrantPath::Role);
        }
    }

    if spec.country_ids.iter().any(|id| grants.countries.contains(id)) {
        return Some(GrantPath::Country);
    }

    None
}

/// Whether any grant path unlocks the chatboard.
#[must_use]
pub fn can_access(grants: &UserGrants, spec: &AccessSpec) -> bool {
    resolve_access(grants, spec).is_some()
}

/// Whether any of `held` appears in the allow-list. Names compare exactly.
#[must_use]
pub fn holds_any_role<S: AsRef<str>>(held: &[S], allowed: &[&str]) -> bool {
    held.iter().any(|name| allowed.contains(&name.as_ref()))
}

/// Highest coarse role label among `held`, if any.
#[must_use]
pub fn coarse_role<S: AsRef<str>>(held: &[S]) -> Option<&'static str> {
    COARSE_ROLES
        .iter()
        .copied()
        .find(|label| held.iter().any(|name| name.as_ref() == *label))
}

/// Permission check errors.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// User lacks access (generic forbidden).
    #[error("Access forbidden")]
    Forbidden,

    /// Database error occurred.
    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for PermissionError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Database(e) => {
                tracing::error!(error = %e, "Permission lookup failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = Json(ErrorResponse {
            error: code.to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}
