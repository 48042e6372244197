use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::auth::ErrorResponse;
use crate::permissions::PermissionError;

/// Who may open a new chatboard.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessRequest {
    #[serde(default)]
    pub squad_ids: Vec<Uuid>,
    #[serde(default)]
    pub role_ids: Vec<Uuid>,
    #[serde(default)]
    pub country_ids: Vec<Uuid>,
}

impl AccessRequest {
    /// Sorted and deduplicated copy.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        for ids in [&mut self.squad_ids, &mut self.role_ids, &mut self.country_ids] {
            ids.sort_unstable();
            ids.dedup();
        }
        self
    }
}

/// Request to create a chatboard.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateChatboardRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    #[serde(default)]
    pub access: AccessRequest,
}

impl CreateChatboardRequest {
    /// Copy with surrounding whitespace removed from the title.
    #[must_use]
    pub fn trimmed(mut self) -> Self {
        let title = self.title.trim();
        if title.len() != self.title.len() {
            self.title = title.to_string();
        }
        self
    }
}

/// A user waiting for approval in one of a chatboard's squads.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PendingUser {
    pub user_id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub squad_id: Uuid,
    pub squad_name: String,
    pub roles: Vec<String>,
    pub requested_at: DateTime<Utc>,
}

/// Error types for chatboard operations.
#[derive(Debug, thiserror::Error)]
pub enum ChatboardError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error("Chatboard not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),
}

impl IntoResponse for ChatboardError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            Self::Permission(inner) => return inner.into_response(),
            Self::Database(ref err) => {
                tracing::error!(error = %err, "Chatboard database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
            Self::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        };

        let body = Json(ErrorResponse {
            error: code.to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}
