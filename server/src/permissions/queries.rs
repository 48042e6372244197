//! Database queries for access resolution.
//!
//! Grants are loaded through [`GrantSource`] so the resolver can run
//! against the database or an in-memory graph.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::filter::Predicate;
use super::models::{
    AccessSpec, ChatboardFilters, ChatboardSummary, ChatboardSummaryRow, SquadRoleGrant, UserGrants,
};
use crate::db::{db_error, MembershipStatus};

/// Chatboard columns plus the names in its access specification.
const CHATBOARD_SUMMARY_SELECT: &str = r"
    SELECT cb.id, cb.title, cb.description, cb.created_at,
        ARRAY(
            SELECT s.name::TEXT FROM chatboard_squads cs
            JOIN squads s ON s.id = cs.squad_id
            WHERE cs.chatboard_id = cb.id ORDER BY s.name
        ) AS squads,
        ARRAY(
            SELECT r.name::TEXT FROM chatboard_roles cr
            JOIN roles r ON r.id = cr.role_id
            WHERE cr.chatboard_id = cb.id ORDER BY r.name
        ) AS roles,
        ARRAY(
            SELECT c.name::TEXT FROM chatboard_countries cc
            JOIN countries c ON c.id = cc.country_id
            WHERE cc.chatboard_id = cb.id ORDER BY c.name
        ) AS countries
    FROM chatboards cb
    WHERE ";

/// Read access to the membership graph.
#[async_trait]
pub trait GrantSource: Send + Sync {
    /// Everything `user_id` holds: memberships, roles and countries.
    async fn user_grants(&self, user_id: Uuid) -> sqlx::Result<UserGrants>;

    /// A chatboard's access specification, `None` if the board does not exist.
    async fn access_spec(&self, chatboard_id: Uuid) -> sqlx::Result<Option<AccessSpec>>;

    /// Names of the user's global roles.
    async fn global_role_names(&self, user_id: Uuid) -> sqlx::Result<Vec<String>>;
}

#[derive(sqlx::FromRow)]
struct MembershipRow {
    squad_id: Uuid,
    status: MembershipStatus,
}

#[derive(sqlx::FromRow)]
struct AccessSpecRow {
    squad_ids: Vec<Uuid>,
    role_ids: Vec<Uuid>,
    country_ids: Vec<Uuid>,
}

#[async_trait]
impl GrantSource for PgPool {
    async fn user_grants(&self, user_id: Uuid) -> sqlx::Result<UserGrants> {
        let memberships = sqlx::query_as::<_, MembershipRow>(
            "SELECT squad_id, status FROM user_squads WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(self);

        let global_roles =
            sqlx::query_scalar::<_, Uuid>("SELECT role_id FROM user_roles WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(self);

        let squad_roles = sqlx::query_as::<_, SquadRoleGrant>(
            "SELECT squad_id, role_id FROM user_squad_roles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(self);

        let countries = sqlx::query_scalar::<_, Uuid>(
            "SELECT country_id FROM user_countries WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(self);

        let (memberships, global_roles, squad_roles, countries) =
            tokio::try_join!(memberships, global_roles, squad_roles, countries)
                .map_err(db_error!("user_grants", user_id = %user_id))?;

        Ok(UserGrants {
            memberships: memberships
                .into_iter()
                .map(|row| (row.squad_id, row.status))
                .collect::<HashMap<_, _>>(),
            global_roles: global_roles.into_iter().collect::<HashSet<_>>(),
            squad_roles,
            countries: countries.into_iter().collect(),
        })
    }

    async fn access_spec(&self, chatboard_id: Uuid) -> sqlx::Result<Option<AccessSpec>> {
        let row = sqlx::query_as::<_, AccessSpecRow>(
            r"
            SELECT
                ARRAY(SELECT squad_id FROM chatboard_squads WHERE chatboard_id = cb.id) AS squad_ids,
                ARRAY(SELECT role_id FROM chatboard_roles WHERE chatboard_id = cb.id) AS role_ids,
                ARRAY(SELECT country_id FROM chatboard_countries WHERE chatboard_id = cb.id) AS country_ids
            FROM chatboards cb
            WHERE cb.id = $1
            ",
        )
        .bind(chatboard_id)
        .fetch_optional(self)
        .await
        .map_err(db_error!("access_spec", chatboard_id = %chatboard_id))?;

        Ok(row.map(|row| AccessSpec {
            squad_ids: row.squad_ids.into_iter().collect(),
            role_ids: row.role_ids.into_iter().collect(),
            country_ids: row.country_ids.into_iter().collect(),
        }))
    }

    async fn global_role_names(&self, user_id: Uuid) -> sqlx::Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r"
            SELECT r.name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1
            ORDER BY r.name
            ",
        )
        .bind(user_id)
        .fetch_all(self)
        .await
        .map_err(db_error!("global_role_names", user_id = %user_id))
    }
}

// ============================================================================
// Chatboard Visibility
// ============================================================================

/// Chatboards `user_id` can open, narrowed by `filters`, newest first.
pub async fn list_visible_chatboards(
    pool: &PgPool,
    user_id: Uuid,
    filters: &ChatboardFilters,
) -> sqlx::Result<Vec<ChatboardSummary>> {
    let mut qb = QueryBuilder::<Postgres>::new(CHATBOARD_SUMMARY_SELECT);
    Predicate::for_listing(user_id, filters).push_sql(&mut qb);
    qb.push(" ORDER BY cb.created_at DESC, cb.id");

    let rows = qb
        .build_query_as::<ChatboardSummaryRow>()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_visible_chatboards", user_id = %user_id))?;

    Ok(rows.into_iter().map(ChatboardSummary::from).collect())
}

/// One chatboard with its access names.
pub async fn find_chatboard_summary(
    pool: &PgPool,
    chatboard_id: Uuid,
) -> sqlx::Result<Option<ChatboardSummary>> {
    let mut qb = QueryBuilder::<Postgres>::new(CHATBOARD_SUMMARY_SELECT);
    qb.push("cb.id = ");
    qb.push_bind(chatboard_id);

    let row = qb
        .build_query_as::<ChatboardSummaryRow>()
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_chatboard_summary", chatboard_id = %chatboard_id))?;

    Ok(row.map(ChatboardSummary::from))
}
