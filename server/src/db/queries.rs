//! Database Queries
//!
//! Runtime queries (no compile-time `DATABASE_URL` required).
//!
//! All query functions include error context logging to aid debugging.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::models::{Country, RefreshTokenRecord, Role, Squad, User};

/// Log and return a database error with context.
///
/// This helper ensures all database errors are logged with relevant context
/// before being propagated, making production debugging easier.
macro_rules! db_error {
    ($query:expr) => {
        |e| {
            ::tracing::error!(query = $query, error = %e, "Database query failed");
            e
        }
    };
    ($query:expr, $($field:tt)*) => {
        |e| {
            ::tracing::error!(query = $query, $($field)*, error = %e, "Database query failed");
            e
        }
    };
}

pub(crate) use db_error;

// ============================================================================
// User Queries
// ============================================================================

/// Fields required to create a user.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub birthday: Option<NaiveDate>,
}

/// Find user by ID.
pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_user_by_id", user_id = %id))
}

/// Find user by email.
pub async fn find_user_by_email(pool: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_user_by_email"))
}

/// Check if email exists.
pub async fn email_exists(pool: &PgPool, email: &str) -> sqlx::Result<bool> {
    let result: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(email)
        .fetch_one(pool)
        .await
        .map_err(db_error!("email_exists"))?;
    Ok(result.0)
}

/// Create a new user. Accepts a pool or an open transaction.
pub async fn create_user<'e, E: PgExecutor<'e>>(
    executor: E,
    user: &NewUser<'_>,
) -> sqlx::Result<User> {
    sqlx::query_as::<_, User>(
        r"
        INSERT INTO users (email, password_hash, first_name, last_name, birthday)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        ",
    )
    .bind(user.email)
    .bind(user.password_hash)
    .bind(user.first_name)
    .bind(user.last_name)
    .bind(user.birthday)
    .fetch_one(executor)
    .await
    .map_err(db_error!("create_user"))
}

/// Update the user's username.
pub async fn update_username(
    pool: &PgPool,
    user_id: Uuid,
    username: &str,
) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET username = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(user_id)
    .bind(username)
    .fetch_optional(pool)
    .await
    .map_err(db_error!("update_username", user_id = %user_id))
}

// ============================================================================
// Refresh Token Queries
// ============================================================================

/// Persist a refresh token digest. Accepts a pool or an open transaction.
pub async fn create_refresh_token<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> sqlx::Result<RefreshTokenRecord> {
    sqlx::query_as::<_, RefreshTokenRecord>(
        r"
        INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
        VALUES ($1, $2, $3)
        RETURNING id, user_id, token_hash, expires_at, created_at
        ",
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .fetch_one(executor)
    .await
    .map_err(db_error!("create_refresh_token", user_id = %user_id))
}

/// Find a refresh token that is valid right now.
pub async fn find_active_refresh_token(
    pool: &PgPool,
    token_hash: &str,
) -> sqlx::Result<Option<RefreshTokenRecord>> {
    sqlx::query_as::<_, RefreshTokenRecord>(
        r"
        SELECT id, user_id, token_hash, expires_at, created_at
        FROM refresh_tokens
        WHERE token_hash = $1 AND expires_at > NOW()
        ",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await
    .map_err(db_error!("find_active_refresh_token"))
}

/// Find a refresh token regardless of expiry.
pub async fn find_refresh_token(
    pool: &PgPool,
    token_hash: &str,
) -> sqlx::Result<Option<RefreshTokenRecord>> {
    sqlx::query_as::<_, RefreshTokenRecord>(
        r"
        SELECT id, user_id, token_hash, expires_at, created_at
        FROM refresh_tokens
        WHERE token_hash = $1
        ",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await
    .map_err(db_error!("find_refresh_token"))
}

/// Delete a refresh token by digest. Returns the number of rows removed.
pub async fn delete_refresh_token(pool: &PgPool, token_hash: &str) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
        .bind(token_hash)
        .execute(pool)
        .await
        .map_err(db_error!("delete_refresh_token"))?;
    Ok(result.rows_affected())
}

/// Delete a refresh token only if it belongs to `user_id`.
pub async fn delete_user_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    token_hash: &str,
) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1 AND token_hash = $2")
        .bind(user_id)
        .bind(token_hash)
        .execute(pool)
        .await
        .map_err(db_error!("delete_user_refresh_token", user_id = %user_id))?;
    Ok(result.rows_affected())
}

// ============================================================================
// Catalog Queries
// ============================================================================

/// List all roles by name.
pub async fn list_roles(pool: &PgPool) -> sqlx::Result<Vec<Role>> {
    sqlx::query_as::<_, Role>("SELECT id, name, created_at FROM roles ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_roles"))
}

/// List all squads by name.
pub async fn list_squads(pool: &PgPool) -> sqlx::Result<Vec<Squad>> {
    sqlx::query_as::<_, Squad>("SELECT id, name, created_at FROM squads ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_squads"))
}

/// List all countries by name.
pub async fn list_countries(pool: &PgPool) -> sqlx::Result<Vec<Country>> {
    sqlx::query_as::<_, Country>("SELECT id, name, created_at FROM countries ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_countries"))
}

/// Create a role. Fails with a unique violation on a duplicate name.
pub async fn create_role(pool: &PgPool, name: &str) -> sqlx::Result<Role> {
    sqlx::query_as::<_, Role>("INSERT INTO roles (name) VALUES ($1) RETURNING id, name, created_at")
        .bind(name)
        .fetch_one(pool)
        .await
        .map_err(db_error!("create_role", name = %name))
}

/// Create a squad. Fails with a unique violation on a duplicate name.
pub async fn create_squad(pool: &PgPool, name: &str) -> sqlx::Result<Squad> {
    sqlx::query_as::<_, Squad>(
        "INSERT INTO squads (name) VALUES ($1) RETURNING id, name, created_at",
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .map_err(db_error!("create_squad", name = %name))
}

/// Create a country. Fails with a unique violation on a duplicate name.
pub async fn create_country(pool: &PgPool, name: &str) -> sqlx::Result<Country> {
    sqlx::query_as::<_, Country>(
        "INSERT INTO countries (name) VALUES ($1) RETURNING id, name, created_at",
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .map_err(db_error!("create_country", name = %name))
}

/// Find squad by ID.
pub async fn find_squad_by_id(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<Squad>> {
    sqlx::query_as::<_, Squad>("SELECT id, name, created_at FROM squads WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_squad_by_id", squad_id = %id))
}

/// Find role by ID.
pub async fn find_role_by_id(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<Role>> {
    sqlx::query_as::<_, Role>("SELECT id, name, created_at FROM roles WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_role_by_id", role_id = %id))
}

/// Find country by ID.
pub async fn find_country_by_id(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<Country>> {
    sqlx::query_as::<_, Country>("SELECT id, name, created_at FROM countries WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_country_by_id", country_id = %id))
}
