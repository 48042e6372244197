//! Access resolution for chatboards.
//!
//! A chatboard is open to a user through any of three grant paths:
//! - Squad: approved membership in a listed squad
//! - Role: a listed role held globally or within an approved squad
//! - Country: association with a listed country
//!
//! Administrative checks use global role names only.

pub mod filter;
pub mod helpers;
pub mod models;
pub mod queries;
pub mod resolver;

pub use filter::{BoardFacts, Predicate};
pub use helpers::{check_permission, has_access, require_any_role, require_chatboard_access};
pub use models::*;
pub use queries::*;
pub use resolver::{can_access, coarse_role, holds_any_role, resolve_access, PermissionError};
