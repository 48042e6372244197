use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::auth::ErrorResponse;
use crate::db::{Membership, MembershipStatus};
use crate::permissions::PermissionError;

/// Request to create a role, squad or country.
#[derive(Debug, Deserialize, Validate)]
pub struct CatalogRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

/// Request to grant a role, globally or within one squad.
#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub squad_id: Option<Uuid>,
}

/// Request to associate the caller with a country.
#[derive(Debug, Deserialize)]
pub struct CountryGrantRequest {
    pub country_id: Uuid,
}

/// Request to set the status of a membership.
#[derive(Debug, Deserialize)]
pub struct VerificationRequest {
    pub user_id: Uuid,
    pub squad_id: Uuid,
    pub status: MembershipStatus,
}

/// A user's membership in one squad, with the roles held there.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SquadMembership {
    pub id: Uuid,
    pub name: String,
    pub status: MembershipStatus,
    pub roles: Vec<String>,
}

/// Profile returned by login, registration and `/auth/me`.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub username: Option<String>,
    pub roles: Vec<String>,
    pub squads: Vec<SquadMembership>,
    pub countries: Vec<String>,
}

/// Result of a join request.
#[derive(Debug)]
pub enum JoinOutcome {
    /// New pending membership.
    Created(Membership),
    /// Rejected membership moved back to pending.
    Reapplied(Membership),
    /// Pending membership left as is.
    Unchanged(Membership),
    /// Already an approved member.
    AlreadyMember,
}

/// What a join request does to an existing membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinAction {
    Insert,
    Reapply,
    Keep,
    Refuse,
}

impl JoinAction {
    /// Decide the transition for a join request. A join request never approves.
    #[must_use]
    pub const fn for_existing(existing: Option<MembershipStatus>) -> Self {
        match existing {
            None => Self::Insert,
            Some(MembershipStatus::Rejected) => Self::Reapply,
            Some(MembershipStatus::Pending) => Self::Keep,
            Some(MembershipStatus::Approved) => Self::Refuse,
        }
    }
}

/// Error types for membership operations.
#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Already an approved member of this squad")]
    AlreadyMember,

    #[error("Name already exists")]
    AlreadyExists,

    #[error("Validation error: {0}")]
    Validation(String),
}

impl IntoResponse for MembershipError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            Self::Permission(inner) => return inner.into_response(),
            Self::Database(ref err) => {
                tracing::error!(error = %err, "Membership database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::AlreadyMember => (StatusCode::CONFLICT, "ALREADY_MEMBER"),
            Self::AlreadyExists => (StatusCode::CONFLICT, "ALREADY_EXISTS"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        };

        let body = Json(ErrorResponse {
            error: code.to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}
