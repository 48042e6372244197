//! Access-control data types.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::db::MembershipStatus;

/// Roles allowed to verify memberships and manage chatboards.
pub const BOARD_MANAGER_ROLES: &[&str] = &["Admin", "Head Unicorn"];

/// Roles allowed to manage catalogs and role assignments.
pub const ADMIN_ROLES: &[&str] = &["Admin"];

/// Coarse role labels resolved by the session middleware, highest first.
pub const COARSE_ROLES: &[&str] = &["Admin", "Head Unicorn"];

/// A chatboard's access specification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessSpec {
    pub squad_ids: HashSet<Uuid>,
    pub role_ids: HashSet<Uuid>,
    pub country_ids: HashSet<Uuid>,
}

/// Role held within one squad only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRow)]
pub struct SquadRoleGrant {
    pub squad_id: Uuid,
    pub role_id: Uuid,
}

/// Snapshot of everything a user holds in the membership graph.
#[derive(Debug, Clone, Default)]
pub struct UserGrants {
    /// Squad ID -> membership status, any status.
    pub memberships: HashMap<Uuid, MembershipStatus>,
    pub global_roles: HashSet<Uuid>,
    pub squad_roles: Vec<SquadRoleGrant>,
    pub countries: HashSet<Uuid>,
}

impl UserGrants {
    /// Whether the user's membership in `squad_id` is approved.
    #[must_use]
    pub fn is_approved_in(&self, squad_id: Uuid) -> bool {
        self.memberships
            .get(&squad_id)
            .is_some_and(|status| status.is_approved())
    }

    /// Squads the user is an approved member of.
    pub fn approved_squads(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.memberships
            .iter()
            .filter(|(_, status)| status.is_approved())
            .map(|(squad_id, _)| *squad_id)
    }

    /// Roles usable on the role path: global grants plus roles held in approved squads.
    #[must_use]
    pub fn effective_roles(&self) -> HashSet<Uuid> {
        let mut roles = self.global_roles.clone();
        roles.extend(
            self.squad_roles
                .iter()
                .filter(|grant| self.is_approved_in(grant.squad_id))
                .map(|grant| grant.role_id),
        );
        roles
    }
}

/// Which grant path unlocked a chatboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantPath {
    Squad,
    Role,
    Country,
}

/// Optional equality filters for chatboard listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatboardFilters {
    #[serde(rename = "filter_role")]
    pub role: Option<String>,
    #[serde(rename = "filter_squad")]
    pub squad: Option<String>,
    #[serde(rename = "filter_country")]
    pub country: Option<String>,
}

impl ChatboardFilters {
    /// Treat empty query values as absent.
    #[must_use]
    pub fn normalized(self) -> Self {
        let clean = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            role: clean(self.role),
            squad: clean(self.squad),
            country: clean(self.country),
        }
    }
}

/// Names in a chatboard's access specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccessNames {
    pub squads: Vec<String>,
    pub roles: Vec<String>,
    pub countries: Vec<String>,
}

/// Chatboard annotated with its full access specification.
#[derive(Debug, Clone, Serialize)]
pub struct ChatboardSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub access: AccessNames,
}

#[derive(Debug, FromRow)]
pub(crate) struct ChatboardSummaryRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub squads: Vec<String>,
    pub roles: Vec<String>,
    pub countries: Vec<String>,
}

impl From<ChatboardSummaryRow> for ChatboardSummary {
    fn from(row: ChatboardSummaryRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            created_at: row.created_at,
            access: AccessNames {
                squads: row.squads,
                roles: row.roles,
                countries: row.countries,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_roles_ignore_unapproved_squads() {
        let approved = Uuid::new_v4();
        let pending = Uuid::new_v4();
        let helper = Uuid::new_v4();
        let moderator = Uuid::new_v4();

        let grants = UserGrants {
            memberships: HashMap::from([
                (approved, MembershipStatus::Approved),
                (pending, MembershipStatus::Pending),
            ]),
            squad_roles: vec![
                SquadRoleGrant {
                    squad_id: approved,
                    role_id: helper,
                },
                SquadRoleGrant {
                    squad_id: pending,
                    role_id: moderator,
                },
            ],
            ..Default::default()
        };

        let roles = grants.effective_roles();
        assert!(roles.contains(&helper));
        assert!(!roles.contains(&moderator));
        assert_eq!(grants.approved_squads().collect::<Vec<_>>(), vec![approved]);
    }

    #[test]
    fn test_filters_deserialize_from_query_names() {
        let filters: ChatboardFilters =
            serde_json::from_str(r#"{"filter_role":"Admin","filter_country":""}"#).unwrap();
        let filters = filters.normalized();

        assert_eq!(filters.role.as_deref(), Some("Admin"));
        assert!(filters.squad.is_none());
        assert!(filters.country.is_none());
    }
}
