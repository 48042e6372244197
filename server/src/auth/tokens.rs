//! Token Service
//!
//! Issues access/refresh pairs, and validates, rotates and revokes refresh tokens.
//!
//! Refresh tokens are 256-bit random values, hex-encoded. Only their SHA-256
//! digest is persisted. A row in the session store is one outstanding session;
//! deleting it revokes the session.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use super::error::{AuthError, AuthResult};
use super::jwt::create_access_token;
use crate::config::Config;
use crate::db;

/// Random bytes per refresh token.
pub const REFRESH_TOKEN_BYTES: usize = 32;

/// Token pair returned after successful authentication.
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Access token (short-lived, signed).
    pub access_token: String,
    /// Refresh token (long-lived, opaque).
    pub refresh_token: String,
    /// Access token expiry in seconds.
    pub access_expires_in: i64,
}

/// A pair that has been generated but not yet persisted.
#[derive(Debug)]
pub struct MintedTokens {
    pub pair: TokenPair,
    /// Digest to store in place of the refresh token.
    pub refresh_hash: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Hash a token for storage using SHA256.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a new opaque refresh token.
#[must_use]
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Build a signed access token and a fresh refresh token for `user_id`.
///
/// Nothing is stored; callers persist `refresh_hash` themselves, either through a
/// [`SessionStore`] or inside their own transaction.
pub fn mint_tokens(user_id: Uuid, config: &Config) -> AuthResult<MintedTokens> {
    let access_token =
        create_access_token(user_id, &config.jwt_secret, config.jwt_access_expiry)?;
    let refresh_token = generate_refresh_token();

    Ok(MintedTokens {
        refresh_hash: hash_token(&refresh_token),
        refresh_expires_at: Utc::now() + Duration::seconds(config.jwt_refresh_expiry),
        pair: TokenPair {
            access_token,
            refresh_token,
            access_expires_in: config.jwt_access_expiry,
        },
    })
}

// ============================================================================
// Session Store
// ============================================================================

/// Persistence for refresh-token sessions, keyed by token digest.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Record a new session.
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> sqlx::Result<()>;

    /// Owner of a session that has not expired yet.
    async fn find_active_owner(&self, token_hash: &str) -> sqlx::Result<Option<Uuid>>;

    /// Owner of a session regardless of expiry.
    async fn find_owner(&self, token_hash: &str) -> sqlx::Result<Option<Uuid>>;

    /// Delete a session. Returns rows removed.
    async fn remove(&self, token_hash: &str) -> sqlx::Result<u64>;

    /// Delete a session only if `user_id` owns it. Returns rows removed.
    async fn remove_owned(&self, user_id: Uuid, token_hash: &str) -> sqlx::Result<u64>;
}

#[async_trait]
impl SessionStore for PgPool {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> sqlx::Result<()> {
        db::create_refresh_token(self, user_id, token_hash, expires_at).await?;
        Ok(())
    }

    async fn find_active_owner(&self, token_hash: &str) -> sqlx::Result<Option<Uuid>> {
        Ok(db::find_active_refresh_token(self, token_hash)
            .await?
            .map(|record| record.user_id))
    }

    async fn find_owner(&self, token_hash: &str) -> sqlx::Result<Option<Uuid>> {
        Ok(db::find_refresh_token(self, token_hash)
            .await?
            .map(|record| record.user_id))
    }

    async fn remove(&self, token_hash: &str) -> sqlx::Result<u64> {
        db::delete_refresh_token(self, token_hash).await
    }

    async fn remove_owned(&self, user_id: Uuid, token_hash: &str) -> sqlx::Result<u64> {
        db::delete_user_refresh_token(self, user_id, token_hash).await
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Issue a new access/refresh pair and persist the refresh token.
///
/// If the session cannot be stored, no tokens are returned.
#[tracing::instrument(skip(store, config))]
pub async fn generate_tokens<S>(store: &S, config: &Config, user_id: Uuid) -> AuthResult<TokenPair>
where
    S: SessionStore + ?Sized,
{
    let minted = mint_tokens(user_id, config)?;

    store
        .insert(user_id, &minted.refresh_hash, minted.refresh_expires_at)
        .await?;

    Ok(minted.pair)
}

/// Resolve a refresh token to its owner if it is valid right now.
pub async fn validate_refresh_token<S>(store: &S, refresh_token: &str) -> AuthResult<Uuid>
where
    S: SessionStore + ?Sized,
{
    store
        .find_active_owner(&hash_token(refresh_token))
        .await?
        .ok_or(AuthError::InvalidRefreshToken)
}

/// Delete a refresh token. Deleting an absent token is not an error.
pub async fn invalidate_refresh_token<S>(store: &S, refresh_token: &str) -> AuthResult<()>
where
    S: SessionStore + ?Sized,
{
    store.remove(&hash_token(refresh_token)).await?;
    Ok(())
}

/// Exchange a refresh token for a brand-new pair.
///
/// The old token is invalidated only after the new pair is stored. A failure
/// to invalidate it is logged and does not fail the exchange.
#[tracing::instrument(skip_all)]
pub async fn rotate_refresh_token<S>(
    store: &S,
    config: &Config,
    refresh_token: &str,
) -> AuthResult<(Uuid, TokenPair)>
where
    S: SessionStore + ?Sized,
{
    let user_id = validate_refresh_token(store, refresh_token).await?;
    let pair = generate_tokens(store, config, user_id).await?;

    if let Err(e) = invalidate_refresh_token(store, refresh_token).await {
        tracing::warn!(user_id = %user_id, error = %e, "Failed to invalidate rotated refresh token");
    }

    Ok((user_id, pair))
}

/// Revoke a refresh token on behalf of `user_id`.
///
/// The delete is conditioned on ownership, so another user's token is never touched.
/// On a miss the token is looked up once more to tell "unknown" from "not yours".
#[tracing::instrument(skip(store, refresh_token))]
pub async fn revoke_refresh_token<S>(store: &S, user_id: Uuid, refresh_token: &str) -> AuthResult<()>
where
    S: SessionStore + ?Sized,
{
    let token_hash = hash_token(refresh_token);

    if store.remove_owned(user_id, &token_hash).await? > 0 {
        return Ok(());
    }

    match store.find_owner(&token_hash).await? {
        Some(owner) => {
            tracing::warn!(user_id = %user_id, owner_id = %owner, "Attempt to revoke another user's session");
            Err(AuthError::RefreshTokenNotOwned)
        }
        None => Err(AuthError::UnknownRefreshToken),
    }
}
