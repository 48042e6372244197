//! Membership Graph writes and profile reads.

use sqlx::PgPool;
use uuid::Uuid;

use super::types::{JoinAction, JoinOutcome, Profile, SquadMembership};
use crate::db::{db_error, Membership, MembershipStatus, User};
use crate::permissions::GrantSource;

const MEMBERSHIP_COLUMNS: &str = "user_id, squad_id, status, created_at, updated_at";

// ============================================================================
// Squad Membership
// ============================================================================

/// Record a join request for `squad_id`.
///
/// The insert is conflict-tolerant: when a membership already exists (or a
/// concurrent request just created one), the row is re-read under a lock and
/// the join transition is applied to it.
pub async fn request_membership(
    pool: &PgPool,
    user_id: Uuid,
    squad_id: Uuid,
) -> sqlx::Result<JoinOutcome> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query_as::<_, Membership>(&format!(
        "INSERT INTO user_squads (user_id, squad_id, status) VALUES ($1, $2, $3) \
         ON CONFLICT (user_id, squad_id) DO NOTHING \
         RETURNING {MEMBERSHIP_COLUMNS}"
    ))
    .bind(user_id)
    .bind(squad_id)
    .bind(MembershipStatus::Pending)
    .fetch_optional(&mut *tx)
    .await
    .map_err(db_error!("request_membership.insert", user_id = %user_id, squad_id = %squad_id))?;

    if let Some(membership) = inserted {
        tx.commit().await?;
        return Ok(JoinOutcome::Created(membership));
    }

    let existing = sqlx::query_as::<_, Membership>(&format!(
        "SELECT {MEMBERSHIP_COLUMNS} FROM user_squads \
         WHERE user_id = $1 AND squad_id = $2 FOR UPDATE"
    ))
    .bind(user_id)
    .bind(squad_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error!("request_membership.lock", user_id = %user_id, squad_id = %squad_id))?;

    let outcome = match JoinAction::for_existing(Some(existing.status)) {
        JoinAction::Refuse => JoinOutcome::AlreadyMember,
        JoinAction::Reapply => {
            let membership = sqlx::query_as::<_, Membership>(&format!(
                "UPDATE user_squads SET status = $3, updated_at = NOW() \
                 WHERE user_id = $1 AND squad_id = $2 RETURNING {MEMBERSHIP_COLUMNS}"
            ))
            .bind(user_id)
            .bind(squad_id)
            .bind(MembershipStatus::Pending)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error!("request_membership.reapply", user_id = %user_id))?;
            JoinOutcome::Reapplied(membership)
        }
        JoinAction::Keep | JoinAction::Insert => JoinOutcome::Unchanged(existing),
    };

    tx.commit().await?;
    Ok(outcome)
}

/// Set a membership's status and record who did it.
///
/// Returns `None` if the membership does not exist. The audit row is written
/// inside a savepoint; if it fails, only the audit row is rolled back.
pub async fn verify_membership(
    pool: &PgPool,
    admin_id: Uuid,
    user_id: Uuid,
    squad_id: Uuid,
    status: MembershipStatus,
) -> sqlx::Result<Option<Membership>> {
    let mut tx = pool.begin().await?;

    let membership = sqlx::query_as::<_, Membership>(&format!(
        "UPDATE user_squads SET status = $3, updated_at = NOW() \
         WHERE user_id = $1 AND squad_id = $2 RETURNING {MEMBERSHIP_COLUMNS}"
    ))
    .bind(user_id)
    .bind(squad_id)
    .bind(status)
    .fetch_optional(&mut *tx)
    .await
    .map_err(db_error!("verify_membership", user_id = %user_id, squad_id = %squad_id))?;

    let Some(membership) = membership else {
        return Ok(None);
    };

    sqlx::query("SAVEPOINT verification_log")
        .execute(&mut *tx)
        .await?;

    let logged = sqlx::query(
        "INSERT INTO verification_logs (admin_id, user_id, squad_id, status) VALUES ($1, $2, $3, $4)",
    )
    .bind(admin_id)
    .bind(user_id)
    .bind(squad_id)
    .bind(status)
    .execute(&mut *tx)
    .await;

    match logged {
        Ok(_) => {
            sqlx::query("RELEASE SAVEPOINT verification_log")
                .execute(&mut *tx)
                .await?;
        }
        Err(e) => {
            tracing::warn!(
                admin_id = %admin_id,
                user_id = %user_id,
                squad_id = %squad_id,
                error = %e,
                "Failed to write verification log"
            );
            sqlx::query("ROLLBACK TO SAVEPOINT verification_log")
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await.map_err(|e| {
        tracing::error!(error = %e, user_id = %user_id, "Failed to commit verification");
        e
    })?;

    Ok(Some(membership))
}

/// The user's memberships with squad names and the roles held in each squad.
pub async fn list_user_memberships(
    pool: &PgPool,
    user_id: Uuid,
) -> sqlx::Result<Vec<SquadMembership>> {
    sqlx::query_as::<_, SquadMembership>(
        r"
        SELECT s.id, s.name, us.status,
            ARRAY(
                SELECT r.name::TEXT
                FROM user_squad_roles usr
                JOIN roles r ON r.id = usr.role_id
                WHERE usr.user_id = us.user_id AND usr.squad_id = us.squad_id
                ORDER BY r.name
            ) AS roles
        FROM user_squads us
        JOIN squads s ON s.id = us.squad_id
        WHERE us.user_id = $1
        ORDER BY s.name
        ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_user_memberships", user_id = %user_id))
}

// ============================================================================
// Role and Country Grants
// ============================================================================

/// Grant a global role. Returns `false` if it was already held.
pub async fn grant_global_role(pool: &PgPool, user_id: Uuid, role_id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query(
        "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(role_id)
    .execute(pool)
    .await
    .map_err(db_error!("grant_global_role", user_id = %user_id, role_id = %role_id))?;
    Ok(result.rows_affected() > 0)
}

/// Grant a role within one squad. Returns `false` if it was already held.
pub async fn grant_squad_role(
    pool: &PgPool,
    user_id: Uuid,
    squad_id: Uuid,
    role_id: Uuid,
) -> sqlx::Result<bool> {
    let result = sqlx::query(
        "INSERT INTO user_squad_roles (user_id, squad_id, role_id) VALUES ($1, $2, $3) \
         ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(squad_id)
    .bind(role_id)
    .execute(pool)
    .await
    .map_err(db_error!("grant_squad_role", user_id = %user_id, squad_id = %squad_id))?;
    Ok(result.rows_affected() > 0)
}

/// Associate a user with a country. Returns `false` if already associated.
pub async fn grant_country(pool: &PgPool, user_id: Uuid, country_id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query(
        "INSERT INTO user_countries (user_id, country_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(country_id)
    .execute(pool)
    .await
    .map_err(db_error!("grant_country", user_id = %user_id, country_id = %country_id))?;
    Ok(result.rows_affected() > 0)
}

/// Names of the countries a user is associated with.
pub async fn list_user_country_names(pool: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r"
        SELECT c.name
        FROM user_countries uc
        JOIN countries c ON c.id = uc.country_id
        WHERE uc.user_id = $1
        ORDER BY c.name
        ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(db_error!("list_user_country_names", user_id = %user_id))
}

// ============================================================================
// Profile
// ============================================================================

/// Load the profile shown to `user`.
pub async fn load_profile(pool: &PgPool, user: &User) -> sqlx::Result<Profile> {
    let (roles, squads, countries) = tokio::try_join!(
        pool.global_role_names(user.id),
        list_user_memberships(pool, user.id),
        list_user_country_names(pool, user.id),
    )?;

    Ok(Profile {
        username: user.username.clone(),
        roles,
        squads,
        countries,
    })
}
