//! Chatboard storage.

use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::types::{AccessRequest, PendingUser};
use crate::db::{db_error, Chatboard, MembershipStatus};

/// Catalog tables an access specification can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Catalog {
    Squads,
    Roles,
    Countries,
}

impl Catalog {
    const fn table(self) -> &'static str {
        match self {
            Self::Squads => "squads",
            Self::Roles => "roles",
            Self::Countries => "countries",
        }
    }

    /// Singular label for error messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Squads => "squad",
            Self::Roles => "role",
            Self::Countries => "country",
        }
    }
}

/// How many of `ids` exist in `catalog`. `ids` must be deduplicated.
pub async fn count_existing<'e, E: PgExecutor<'e>>(
    executor: E,
    catalog: Catalog,
    ids: &[Uuid],
) -> sqlx::Result<i64> {
    if ids.is_empty() {
        return Ok(0);
    }

    sqlx::query_scalar::<_, i64>(&format!(
        "SELECT COUNT(*) FROM {} WHERE id = ANY($1)",
        catalog.table()
    ))
    .bind(ids)
    .fetch_one(executor)
    .await
    .map_err(db_error!("count_existing", catalog = catalog.table()))
}

/// Catalogs in which some of the referenced ids do not exist.
pub async fn missing_references(
    pool: &PgPool,
    access: &AccessRequest,
) -> sqlx::Result<Vec<Catalog>> {
    let (squads, roles, countries) = tokio::try_join!(
        count_existing(pool, Catalog::Squads, &access.squad_ids),
        count_existing(pool, Catalog::Roles, &access.role_ids),
        count_existing(pool, Catalog::Countries, &access.country_ids),
    )?;

    Ok([
        (Catalog::Squads, squads, access.squad_ids.len()),
        (Catalog::Roles, roles, access.role_ids.len()),
        (Catalog::Countries, countries, access.country_ids.len()),
    ]
    .into_iter()
    .filter(|(_, found, wanted)| *found != *wanted as i64)
    .map(|(catalog, _, _)| catalog)
    .collect())
}

/// Insert a chatboard and its full access specification atomically.
pub async fn insert_chatboard(
    pool: &PgPool,
    title: &str,
    description: &str,
    access: &AccessRequest,
) -> sqlx::Result<Chatboard> {
    let mut tx = pool.begin().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to start chatboard transaction");
        e
    })?;

    let chatboard = sqlx::query_as::<_, Chatboard>(
        r"
        INSERT INTO chatboards (title, description)
        VALUES ($1, $2)
        RETURNING id, title, description, created_at
        ",
    )
    .bind(title)
    .bind(description)
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error!("insert_chatboard"))?;

    for (table, column, ids) in [
        ("chatboard_squads", "squad_id", &access.squad_ids),
        ("chatboard_roles", "role_id", &access.role_ids),
        ("chatboard_countries", "country_id", &access.country_ids),
    ] {
        if ids.is_empty() {
            continue;
        }

        sqlx::query(&format!(
            "INSERT INTO {table} (chatboard_id, {column}) SELECT $1, UNNEST($2::UUID[])"
        ))
        .bind(chatboard.id)
        .bind(ids.as_slice())
        .execute(&mut *tx)
        .await
        .map_err(db_error!("insert_chatboard.access", table = table, chatboard_id = %chatboard.id))?;
    }

    tx.commit().await.map_err(|e| {
        tracing::error!(error = %e, chatboard_id = %chatboard.id, "Failed to commit chatboard");
        e
    })?;

    Ok(chatboard)
}

/// Whether a chatboard exists.
pub async fn chatboard_exists(pool: &PgPool, chatboard_id: Uuid) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM chatboards WHERE id = $1)")
        .bind(chatboard_id)
        .fetch_one(pool)
        .await
        .map_err(db_error!("chatboard_exists", chatboard_id = %chatboard_id))
}

/// Users with a pending membership in any squad of the chatboard.
pub async fn list_pending_users(
    pool: &PgPool,
    chatboard_id: Uuid,
) -> sqlx::Result<Vec<PendingUser>> {
    sqlx::query_as::<_, PendingUser>(
        r"
        SELECT u.id AS user_id, u.email, u.username, u.first_name, u.last_name,
            s.id AS squad_id, s.name AS squad_name, us.created_at AS requested_at,
            ARRAY(
                SELECT r.name::TEXT
                FROM user_squad_roles usr
                JOIN roles r ON r.id = usr.role_id
                WHERE usr.user_id = u.id AND usr.squad_id = s.id
                ORDER BY r.name
            ) AS roles
        FROM chatboard_squads cs
        JOIN squads s ON s.id = cs.squad_id
        JOIN user_squads us ON us.squad_id = cs.squad_id
        JOIN users u ON u.id = us.user_id
        WHERE cs.chatboard_id = $1 AND us.status = $2
        ORDER BY us.created_at, u.id
        ",
    )
    .bind(chatboard_id)
    .bind(MembershipStatus::Pending)
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_pending_users", chatboard_id = %chatboard_id))
}
