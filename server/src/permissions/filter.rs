//! Chatboard visibility predicates.
//!
//! A [`Predicate`] is compiled to a SQL boolean expression over the
//! `chatboards cb` alias. Every value is bound; nothing is interpolated.

use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::models::{AccessNames, AccessSpec, ChatboardFilters, UserGrants};
use super::resolver::resolve_access;
use crate::db::MembershipStatus;

/// Boolean condition over a single chatboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// User has an approved membership in one of the board's squads.
    SquadGrant(Uuid),
    /// User holds one of the board's roles globally or in an approved squad.
    RoleGrant(Uuid),
    /// User is associated with one of the board's countries.
    CountryGrant(Uuid),
    /// Board lists a squad with this exact name.
    SquadNamed(String),
    /// Board lists a role with this exact name.
    RoleNamed(String),
    /// Board lists a country with this exact name.
    CountryNamed(String),
    /// Every child holds. Empty is true.
    All(Vec<Predicate>),
    /// Some child holds. Empty is false.
    Any(Vec<Predicate>),
}

/// What a predicate can observe about one chatboard.
#[derive(Debug, Clone, Default)]
pub struct BoardFacts {
    pub spec: AccessSpec,
    pub names: AccessNames,
}

impl Predicate {
    /// Boards `user_id` can open through any grant path.
    #[must_use]
    pub fn visible_to(user_id: Uuid) -> Self {
        Self::Any(vec![
            Self::SquadGrant(user_id),
            Self::RoleGrant(user_id),
            Self::CountryGrant(user_id),
        ])
    }

    /// Visibility narrowed by the listing filters.
    #[must_use]
    pub fn for_listing(user_id: Uuid, filters: &ChatboardFilters) -> Self {
        let mut clauses = vec![Self::visible_to(user_id)];

        if let Some(role) = &filters.role {
            clauses.push(Self::RoleNamed(role.clone()));
        }
        if let Some(squad) = &filters.squad {
            clauses.push(Self::SquadNamed(squad.clone()));
        }
        if let Some(country) = &filters.country {
            clauses.push(Self::CountryNamed(country.clone()));
        }

        Self::All(clauses)
    }

    /// Append this predicate as a SQL boolean expression.
    pub fn push_sql(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::SquadGrant(user_id) => {
                qb.push(
                    "EXISTS (SELECT 1 FROM chatboard_squads cs \
                     JOIN user_squads us ON us.squad_id = cs.squad_id \
                     WHERE cs.chatboard_id = cb.id AND us.status = ",
                );
                qb.push_bind(MembershipStatus::Approved);
                qb.push(" AND us.user_id = ");
                qb.push_bind(*user_id);
                qb.push(")");
            }
            Self::RoleGrant(user_id) => {
                qb.push(
                    "EXISTS (SELECT 1 FROM chatboard_roles cr \
                     WHERE cr.chatboard_id = cb.id AND (\
                     cr.role_id IN (SELECT ur.role_id FROM user_roles ur WHERE ur.user_id = ",
                );
                qb.push_bind(*user_id);
                qb.push(
                    ") OR cr.role_id IN (SELECT usr.role_id FROM user_squad_roles usr \
                     JOIN user_squads us ON us.user_id = usr.user_id AND us.squad_id = usr.squad_id \
                     WHERE us.status = ",
                );
                qb.push_bind(MembershipStatus::Approved);
                qb.push(" AND usr.user_id = ");
                qb.push_bind(*user_id);
                qb.push(")))");
            }
            Self::CountryGrant(user_id) => {
                qb.push(
                    "EXISTS (SELECT 1 FROM chatboard_countries cc \
                     JOIN user_countries uc ON uc.country_id = cc.country_id \
                     WHERE cc.chatboard_id = cb.id AND uc.user_id = ",
                );
                qb.push_bind(*user_id);
                qb.push(")");
            }
            Self::SquadNamed(name) => {
                qb.push(
                    "EXISTS (SELECT 1 FROM chatboard_squads cs \
                     JOIN squads s ON s.id = cs.squad_id \
                     WHERE cs.chatboard_id = cb.id AND s.name = ",
                );
                qb.push_bind(name.clone());
                qb.push(")");
            }
            Self::RoleNamed(name) => {
                qb.push(
                    "EXISTS (SELECT 1 FROM chatboard_roles cr \
                     JOIN roles r ON r.id = cr.role_id \
                     WHERE cr.chatboard_id = cb.id AND r.name = ",
                );
                qb.push_bind(name.clone());
                qb.push(")");
            }
            Self::CountryNamed(name) => {
                qb.push(
                    "EXISTS (SELECT 1 FROM chatboard_countries cc \
                     JOIN countries c ON c.id = cc.country_id \
                     WHERE cc.chatboard_id = cb.id AND c.name = ",
                );
                qb.push_bind(name.clone());
                qb.push(")");
            }
            Self::All(children) => push_joined(qb, children, " AND ", "TRUE"),
            Self::Any(children) => push_joined(qb, children, " OR ", "FALSE"),
        }
    }

    /// Evaluate against in-memory facts. `grants` belong to the user the
    /// grant predicates name.
    #[must_use]
    pub fn evaluate(&self, grants: &UserGrants, board: &BoardFacts) -> bool {
        match self {
            Self::SquadGrant(_) => board.spec.squad_ids.iter().any(|s| grants.is_approved_in(*s)),
            Self::RoleGrant(_) => {
                let roles = grants.effective_roles();
                board.spec.role_ids.iter().any(|r| roles.contains(r))
            }
            Self::CountryGrant(_) => board
                .spec
                .country_ids
                .iter()
                .any(|c| grants.countries.contains(c)),
            Self::SquadNamed(name) => board.names.squads.contains(name),
            Self::RoleNamed(name) => board.names.roles.contains(name),
            Self::CountryNamed(name) => board.names.countries.contains(name),
            Self::All(children) => children.iter().all(|p| p.evaluate(grants, board)),
            Self::Any(children) => children.iter().any(|p| p.evaluate(grants, board)),
        }
    }
}

fn push_joined(
    qb: &mut QueryBuilder<'_, Postgres>,
    children: &[Predicate],
    separator: &str,
    empty: &str,
) {
    if children.is_empty() {
        qb.push(empty);
        return;
    }

    qb.push("(");
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            qb.push(separator);
        }
        child.push_sql(qb);
    }
    qb.push(")");
}

/// Whether the holder of `grants` sees the board under `filters`.
#[must_use]
pub fn is_listed(grants: &UserGrants, filters: &ChatboardFilters, board: &BoardFacts) -> bool {
    let listed = Predicate::for_listing(Uuid::nil(), filters).evaluate(grants, board);
    debug_assert!(!listed || resolve_access(grants, &board.spec).is_some());
    listed
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use proptest::prelude::*;

    use super::*;

    fn compile(predicate: &Predicate) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT cb.id FROM chatboards cb WHERE ");
        predicate.push_sql(&mut qb);
        qb.sql().to_string()
    }

    #[test]
    fn test_empty_groups_compile_to_constants() {
        assert!(compile(&Predicate::All(vec![])).ends_with("WHERE TRUE"));
        assert!(compile(&Predicate::Any(vec![])).ends_with("WHERE FALSE"));
    }

    #[test]
    fn test_visibility_binds_every_value() {
        let sql = compile(&Predicate::visible_to(Uuid::new_v4()));

        // squad: status + user, role: user + status + user, country: user
        assert!(sql.contains("$6"));
        assert!(!sql.contains("$7"));
        assert!(sql.contains(" OR "));
        assert!(!sql.contains("approved'"));
    }

    #[test]
    fn test_filters_are_bound_not_interpolated() {
        let filters = ChatboardFilters {
            role: Some("Admin' OR 1=1 --".into()),
            squad: Some("Squad 7".into()),
            country: Some("Estonia".into()),
        };
        let sql = compile(&Predicate::for_listing(Uuid::new_v4(), &filters));

        assert!(!sql.contains("Admin"));
        assert!(!sql.contains("Squad 7"));
        assert!(!sql.contains("Estonia"));
        assert!(sql.contains("$9"));
        assert!(!sql.contains("$10"));
        assert_eq!(sql.matches(" AND EXISTS").count(), 3);
    }

    #[test]
    fn test_unfiltered_listing_is_plain_visibility() {
        let sql = compile(&Predicate::for_listing(
            Uuid::new_v4(),
            &ChatboardFilters::default(),
        ));
        assert!(!sql.contains("s.name"));
        assert!(!sql.contains("r.name"));
        assert!(!sql.contains("c.name"));
    }

    #[test]
    fn test_evaluate_matches_names() {
        let squad_7 = Uuid::new_v4();
        let grants = UserGrants {
            memberships: HashMap::from([(squad_7, MembershipStatus::Approved)]),
            ..Default::default()
        };
        let board = BoardFacts {
            spec: AccessSpec {
                squad_ids: HashSet::from([squad_7]),
                ..Default::default()
            },
            names: AccessNames {
                squads: vec!["Squad 7".into()],
                ..Default::default()
            },
        };

        let by_squad = ChatboardFilters {
            squad: Some("Squad 7".into()),
            ..Default::default()
        };
        let by_role = ChatboardFilters {
            role: Some("Admin".into()),
            ..Default::default()
        };

        assert!(is_listed(&grants, &ChatboardFilters::default(), &board));
        assert!(is_listed(&grants, &by_squad, &board));
        assert!(!is_listed(&grants, &by_role, &board));
    }

    const NAMES: [&str; 3] = ["Squad 7", "Admin", "Estonia"];

    fn optional_name() -> impl Strategy<Value = Option<String>> {
        prop::option::of(prop::sample::select(NAMES.to_vec()).prop_map(String::from))
    }

    proptest! {
        /// Property: filters only ever narrow the visible set.
        #[test]
        fn filters_only_narrow(
            approved in any::<bool>(),
            holds_country in any::<bool>(),
            board_squad_names in prop::collection::vec(prop::sample::select(NAMES.to_vec()), 0..3),
            role in optional_name(),
            squad in optional_name(),
            country in optional_name(),
        ) {
            let squad_id = Uuid::from_u128(7);
            let country_id = Uuid::from_u128(372);
            let status = if approved { MembershipStatus::Approved } else { MembershipStatus::Pending };

            let mut grants = UserGrants {
                memberships: HashMap::from([(squad_id, status)]),
                ..Default::default()
            };
            if holds_country {
                grants.countries.insert(country_id);
            }

            let board = BoardFacts {
                spec: AccessSpec {
                    squad_ids: HashSet::from([squad_id]),
                    country_ids: HashSet::from([country_id]),
                    ..Default::default()
                },
                names: AccessNames {
                    squads: board_squad_names.into_iter().map(String::from).collect(),
                    roles: vec!["Admin".into()],
                    countries: vec!["Estonia".into()],
                },
            };
            let filters = ChatboardFilters { role, squad, country };

            if is_listed(&grants, &filters, &board) {
                prop_assert!(is_listed(&grants, &ChatboardFilters::default(), &board));
            }
            prop_assert_eq!(
                is_listed(&grants, &ChatboardFilters::default(), &board),
                approved || holds_country
            );
        }
    }
}
