//! Unicorn Server
//!
//! Membership backend for squads, roles and countries, with chatboards gated
//! by those grants and a refresh-token session lifecycle.

pub mod api;
pub mod auth;
pub mod chatboards;
pub mod config;
pub mod db;
pub mod membership;
pub mod permissions;
