//! Database Models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User model.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub birthday: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Role catalog entry ("Admin", "Head Unicorn", ...).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Squad catalog entry.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Squad {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Country catalog entry.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Country {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Squad membership status.
///
/// Stored as the `membership_status` enum; serialized as `"Pending"`, `"Approved"`, `"Rejected"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "membership_status", rename_all = "lowercase")]
pub enum MembershipStatus {
    Pending,
    Approved,
    Rejected,
}

impl MembershipStatus {
    /// Only an approved membership counts as a grant.
    #[must_use]
    pub const fn is_approved(self) -> bool {
        matches!(self, Self::Approved)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }
}

impl std::fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User ↔ squad membership.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Membership {
    pub user_id: Uuid,
    pub squad_id: Uuid,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted refresh token (session).
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRecord {
    /// Row ID.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// SHA256 hash of the opaque refresh token.
    pub token_hash: String,
    /// When the token stops being accepted.
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Chatboard row (access specification lives in the `chatboard_*` tables).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Chatboard {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
