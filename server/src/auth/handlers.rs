//! Authentication HTTP Handlers

use axum::extract::State;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::error::{AuthError, AuthResult};
use super::middleware::AuthUser;
use super::password::{hash_password, verify_password};
use super::tokens::{generate_tokens, mint_tokens, revoke_refresh_token, rotate_refresh_token, TokenPair};
use crate::api::AppState;
use crate::db::{
    self, create_refresh_token, create_user, find_user_by_email, find_user_by_id, NewUser, User,
};
use crate::membership::{queries::load_profile, Profile};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Registration request.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 50))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    /// Password (8-128 characters).
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub birthday: Option<NaiveDate>,
}

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh request.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    /// Refresh token.
    pub refresh_token: String,
}

/// Logout request.
#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    /// Refresh token to invalidate.
    pub refresh_token: String,
}

/// Update profile request.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
}

/// Token pair response.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// Access token (short-lived).
    pub access_token: String,
    /// Refresh token (long-lived).
    pub refresh_token: String,
    /// Access token expiry in seconds.
    pub expires_in: i64,
    /// Token type (always "Bearer").
    pub token_type: &'static str,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.access_expires_in,
            token_type: "Bearer",
        }
    }
}

/// Login and registration response.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub tokens: TokenResponse,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub profile: Profile,
}

impl AuthResponse {
    fn new(user: User, pair: TokenPair, profile: Profile) -> Self {
        Self {
            tokens: pair.into(),
            user_id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            profile,
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a new user.
///
/// The user row and its first refresh token are written in one transaction,
/// so no account exists without a usable session.
///
/// POST /auth/register
#[tracing::instrument(skip(state, body))]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AuthResult<Json<AuthResponse>> {
    body.validate()
        .map_err(|e| AuthError::Validation(e.to_string()))?;

    let email = normalize_email(&body.email);
    if db::email_exists(&state.db, &email).await? {
        return Err(AuthError::UserAlreadyExists);
    }

    let password_hash = hash_password(&body.password).map_err(|_| AuthError::PasswordHash)?;

    let mut tx = state.db.begin().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to start registration transaction");
        e
    })?;

    // UNIQUE constraint catches concurrent registrations with the same email
    let user = create_user(
        &mut *tx,
        &NewUser {
            email: &email,
            password_hash: &password_hash,
            first_name: body.first_name.trim(),
            last_name: body.last_name.trim(),
            birthday: body.birthday,
        },
    )
    .await
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            AuthError::UserAlreadyExists
        } else {
            AuthError::Database(e)
        }
    })?;

    let minted = mint_tokens(user.id, &state.config)?;
    create_refresh_token(
        &mut *tx,
        user.id,
        &minted.refresh_hash,
        minted.refresh_expires_at,
    )
    .await?;

    tx.commit().await.map_err(|e| {
        tracing::error!(
            error = %e,
            user_id = %user.id,
            "Failed to commit registration transaction - user account rolled back"
        );
        e
    })?;

    tracing::info!(user_id = %user.id, "User registered");

    let profile = load_profile(&state.db, &user).await?;
    Ok(Json(AuthResponse::new(user, minted.pair, profile)))
}

/// Login with email/password.
///
/// Unknown email and wrong password produce the same error.
///
/// POST /auth/login
#[tracing::instrument(skip(state, body))]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AuthResult<Json<AuthResponse>> {
    let user = find_user_by_email(&state.db, &normalize_email(&body.email))
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let valid =
        verify_password(&body.password, &user.password_hash).map_err(|_| AuthError::PasswordHash)?;
    if !valid {
        tracing::info!(user_id = %user.id, "Login rejected: wrong password");
        return Err(AuthError::InvalidCredentials);
    }

    let pair = generate_tokens(&state.db, &state.config, user.id).await?;
    tracing::info!(user_id = %user.id, "User logged in");

    let profile = load_profile(&state.db, &user).await?;
    Ok(Json(AuthResponse::new(user, pair, profile)))
}

/// Exchange a refresh token for a new pair.
///
/// POST /auth/refresh
#[tracing::instrument(skip(state, body))]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AuthResult<Json<TokenResponse>> {
    let (user_id, pair) = rotate_refresh_token(&state.db, &state.config, &body.refresh_token).await?;

    tracing::info!(user_id = %user_id, "Token refreshed");

    Ok(Json(pair.into()))
}

/// Logout and revoke the given refresh token.
///
/// POST /auth/logout
#[tracing::instrument(skip(state, body), fields(user_id = %auth_user.id))]
pub async fn logout(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(body): Json<LogoutRequest>,
) -> AuthResult<Json<Value>> {
    revoke_refresh_token(&state.db, auth_user.id, &body.refresh_token).await?;

    tracing::info!(user_id = %auth_user.id, "User logged out");

    Ok(Json(json!({ "message": "Successfully logged out" })))
}

/// Get current user profile.
///
/// GET /auth/me
#[tracing::instrument(skip(state), fields(user_id = %auth_user.id))]
pub async fn get_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AuthResult<Json<Profile>> {
    let user = find_user_by_id(&state.db, auth_user.id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    Ok(Json(load_profile(&state.db, &user).await?))
}

/// Set the current user's username.
///
/// PUT /auth/me
#[tracing::instrument(skip(state, body), fields(user_id = %auth_user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(body): Json<UpdateProfileRequest>,
) -> AuthResult<Json<Profile>> {
    body.validate()
        .map_err(|e| AuthError::Validation(e.to_string()))?;

    let username = body.username.trim();
    if username.is_empty() {
        return Err(AuthError::Validation("username must not be blank".to_string()));
    }

    let user = db::update_username(&state.db, auth_user.id, username)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    Ok(Json(load_profile(&state.db, &user).await?))
}
