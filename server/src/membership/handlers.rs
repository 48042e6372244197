//! Membership and catalog HTTP handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::queries;
use super::types::{
    AssignRoleRequest, CatalogRequest, CountryGrantRequest, JoinOutcome, MembershipError,
    SquadMembership, VerificationRequest,
};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::db::{self, Country, Membership, Role, Squad};
use crate::permissions::{require_any_role, ADMIN_ROLES, BOARD_MANAGER_ROLES};

type MembershipResult<T> = Result<T, MembershipError>;

fn validated(body: &CatalogRequest) -> MembershipResult<&str> {
    body.validate()
        .map_err(|e| MembershipError::Validation(e.to_string()))?;
    Ok(body.name.trim())
}

fn unique_or(err: sqlx::Error) -> MembershipError {
    if db::is_unique_violation(&err) {
        MembershipError::AlreadyExists
    } else {
        MembershipError::Database(err)
    }
}

// ============================================================================
// Catalogs
// ============================================================================

/// GET /api/roles
pub async fn list_roles(State(state): State<AppState>) -> MembershipResult<Json<Vec<Role>>> {
    Ok(Json(db::list_roles(&state.db).await?))
}

/// POST /api/roles
#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn create_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CatalogRequest>,
) -> MembershipResult<(StatusCode, Json<Role>)> {
    require_any_role(&state.db, auth.id, ADMIN_ROLES).await?;
    let name = validated(&body)?;

    let role = db::create_role(&state.db, name).await.map_err(unique_or)?;
    tracing::info!(role_id = %role.id, name = %role.name, "Role created");

    Ok((StatusCode::CREATED, Json(role)))
}

/// GET /api/squads
pub async fn list_squads(State(state): State<AppState>) -> MembershipResult<Json<Vec<Squad>>> {
    Ok(Json(db::list_squads(&state.db).await?))
}

/// POST /api/squads
#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn create_squad(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CatalogRequest>,
) -> MembershipResult<(StatusCode, Json<Squad>)> {
    require_any_role(&state.db, auth.id, ADMIN_ROLES).await?;
    let name = validated(&body)?;

    let squad = db::create_squad(&state.db, name).await.map_err(unique_or)?;
    tracing::info!(squad_id = %squad.id, name = %squad.name, "Squad created");

    Ok((StatusCode::CREATED, Json(squad)))
}

/// GET /api/countries
pub async fn list_countries(
    State(state): State<AppState>,
) -> MembershipResult<Json<Vec<Country>>> {
    Ok(Json(db::list_countries(&state.db).await?))
}

/// POST /api/countries
#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn create_country(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CatalogRequest>,
) -> MembershipResult<(StatusCode, Json<Country>)> {
    require_any_role(&state.db, auth.id, ADMIN_ROLES).await?;
    let name = validated(&body)?;

    let country = db::create_country(&state.db, name)
        .await
        .map_err(unique_or)?;
    tracing::info!(country_id = %country.id, name = %country.name, "Country created");

    Ok((StatusCode::CREATED, Json(country)))
}

// ============================================================================
// Grants
// ============================================================================

/// POST /api/roles/assign
///
/// Grants a global role, or a squad-scoped role when `squad_id` is given.
#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn assign_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<AssignRoleRequest>,
) -> MembershipResult<Json<Value>> {
    require_any_role(&state.db, auth.id, ADMIN_ROLES).await?;

    if db::find_user_by_id(&state.db, body.user_id).await?.is_none() {
        return Err(MembershipError::NotFound("User"));
    }
    if db::find_role_by_id(&state.db, body.role_id).await?.is_none() {
        return Err(MembershipError::NotFound("Role"));
    }

    let granted = match body.squad_id {
        Some(squad_id) => {
            if db::find_squad_by_id(&state.db, squad_id).await?.is_none() {
                return Err(MembershipError::NotFound("Squad"));
            }
            queries::grant_squad_role(&state.db, body.user_id, squad_id, body.role_id).await?
        }
        None => queries::grant_global_role(&state.db, body.user_id, body.role_id).await?,
    };

    tracing::info!(
        target_user = %body.user_id,
        role_id = %body.role_id,
        squad_id = ?body.squad_id,
        granted,
        "Role assigned"
    );

    Ok(Json(json!({ "message": "Role assigned" })))
}

/// POST /api/me/countries
#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn add_my_country(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CountryGrantRequest>,
) -> MembershipResult<Json<Value>> {
    if db::find_country_by_id(&state.db, body.country_id)
        .await?
        .is_none()
    {
        return Err(MembershipError::NotFound("Country"));
    }

    queries::grant_country(&state.db, auth.id, body.country_id).await?;

    Ok(Json(json!({ "message": "Country added" })))
}

// ============================================================================
// Squad Membership
// ============================================================================

/// POST /api/squads/{squad_id}/join
#[tracing::instrument(skip(state), fields(user_id = %auth.id))]
pub async fn join_squad(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(squad_id): Path<Uuid>,
) -> MembershipResult<(StatusCode, Json<Membership>)> {
    if db::find_squad_by_id(&state.db, squad_id).await?.is_none() {
        return Err(MembershipError::NotFound("Squad"));
    }

    match queries::request_membership(&state.db, auth.id, squad_id).await? {
        JoinOutcome::AlreadyMember => Err(MembershipError::AlreadyMember),
        JoinOutcome::Unchanged(membership) => Ok((StatusCode::OK, Json(membership))),
        JoinOutcome::Created(membership) | JoinOutcome::Reapplied(membership) => {
            tracing::info!(squad_id = %squad_id, "Membership requested");
            Ok((StatusCode::CREATED, Json(membership)))
        }
    }
}

/// GET /api/me/squads
pub async fn list_my_squads(
    State(state): State<AppState>,
    auth: AuthUser,
) -> MembershipResult<Json<Vec<SquadMembership>>> {
    Ok(Json(
        queries::list_user_memberships(&state.db, auth.id).await?,
    ))
}

/// POST /api/verification
///
/// Approve or reject a membership. Requires Admin or Head Unicorn.
#[tracing::instrument(skip(state, body), fields(admin_id = %auth.id))]
pub async fn verify_membership(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<VerificationRequest>,
) -> MembershipResult<Json<Membership>> {
    require_any_role(&state.db, auth.id, BOARD_MANAGER_ROLES).await?;

    let membership = queries::verify_membership(
        &state.db,
        auth.id,
        body.user_id,
        body.squad_id,
        body.status,
    )
    .await?
    .ok_or(MembershipError::NotFound("Membership"))?;

    tracing::info!(
        target_user = %body.user_id,
        squad_id = %body.squad_id,
        status = %body.status,
        "Membership verified"
    );

    Ok(Json(membership))
}
