//! Chatboard HTTP handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::queries;
use super::types::{ChatboardError, CreateChatboardRequest, PendingUser};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::db;
use crate::permissions::{
    find_chatboard_summary, list_visible_chatboards, require_any_role, require_chatboard_access,
    ChatboardFilters, ChatboardSummary, PermissionError, BOARD_MANAGER_ROLES,
};

type ChatboardResult<T> = Result<T, ChatboardError>;

/// POST /api/chatboards
///
/// Requires Admin or Head Unicorn. Every referenced squad, role and country
/// must exist.
#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn create_chatboard(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateChatboardRequest>,
) -> ChatboardResult<(StatusCode, Json<ChatboardSummary>)> {
    require_any_role(&state.db, auth.id, BOARD_MANAGER_ROLES).await?;

    let body = body.trimmed();
    body.validate()
        .map_err(|e| ChatboardError::Validation(e.to_string()))?;

    let access = body.access.normalized();
    let missing = queries::missing_references(&state.db, &access).await?;
    if !missing.is_empty() {
        let labels: Vec<_> = missing.iter().map(|c| c.label()).collect();
        return Err(ChatboardError::Validation(format!(
            "unknown {} id",
            labels.join(", ")
        )));
    }

    let chatboard = queries::insert_chatboard(&state.db, &body.title, &body.description, &access)
        .await
        .map_err(|e| {
            if db::is_foreign_key_violation(&e) {
                ChatboardError::Validation("access references a deleted entry".to_string())
            } else {
                ChatboardError::Database(e)
            }
        })?;

    tracing::info!(
        chatboard_id = %chatboard.id,
        squads = access.squad_ids.len(),
        roles = access.role_ids.len(),
        countries = access.country_ids.len(),
        "Chatboard created"
    );

    let summary = find_chatboard_summary(&state.db, chatboard.id)
        .await?
        .ok_or(ChatboardError::NotFound)?;

    Ok((StatusCode::CREATED, Json(summary)))
}

/// GET /api/chatboards
///
/// Chatboards the caller can open, optionally narrowed by role, squad or
/// country name.
#[tracing::instrument(skip(state), fields(user_id = %auth.id))]
pub async fn list_chatboards(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filters): Query<ChatboardFilters>,
) -> ChatboardResult<Json<Vec<ChatboardSummary>>> {
    let filters = filters.normalized();
    let boards = list_visible_chatboards(&state.db, auth.id, &filters).await?;
    Ok(Json(boards))
}

/// GET /api/chatboards/{id}
///
/// A missing chatboard is reported the same way as a denied one.
#[tracing::instrument(skip(state), fields(user_id = %auth.id))]
pub async fn get_chatboard(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chatboard_id): Path<Uuid>,
) -> ChatboardResult<Json<ChatboardSummary>> {
    require_chatboard_access(&state.db, auth.id, chatboard_id).await?;

    let summary = find_chatboard_summary(&state.db, chatboard_id)
        .await?
        .ok_or(PermissionError::Forbidden)?;

    Ok(Json(summary))
}

/// GET /api/chatboards/{id}/pending-users
///
/// Requires Admin or Head Unicorn.
#[tracing::instrument(skip(state), fields(user_id = %auth.id))]
pub async fn pending_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chatboard_id): Path<Uuid>,
) -> ChatboardResult<Json<Vec<PendingUser>>> {
    require_any_role(&state.db, auth.id, BOARD_MANAGER_ROLES).await?;

    if !queries::chatboard_exists(&state.db, chatboard_id).await? {
        return Err(ChatboardError::NotFound);
    }

    Ok(Json(
        queries::list_pending_users(&state.db, chatboard_id).await?,
    ))
}
