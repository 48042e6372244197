//! Permission helper functions for API handlers.
//!
//! Load grants and check them in a single call.

use uuid::Uuid;

use super::queries::GrantSource;
use super::resolver::{holds_any_role, resolve_access, PermissionError};

/// Whether `user_id` can open `chatboard_id` through any grant path.
///
/// A chatboard that does not exist is not accessible.
#[tracing::instrument(skip(source))]
pub async fn has_access<G: GrantSource + ?Sized>(
    source: &G,
    user_id: Uuid,
    chatboard_id: Uuid,
) -> Result<bool, PermissionError> {
    let (spec, grants) = tokio::try_join!(
        source.access_spec(chatboard_id),
        source.user_grants(user_id)
    )?;

    let Some(spec) = spec else {
        return Ok(false);
    };

    let path = resolve_access(&grants, &spec);
    if let Some(path) = path {
        tracing::debug!(?path, "Chatboard access granted");
    }

    Ok(path.is_some())
}

/// Whether `user_id` holds a global role named in `allowed`.
///
/// Squad-scoped roles never satisfy this check.
#[tracing::instrument(skip(source))]
pub async fn check_permission<G: GrantSource + ?Sized>(
    source: &G,
    user_id: Uuid,
    allowed: &[&str],
) -> Result<bool, PermissionError> {
    let names = source.global_role_names(user_id).await?;
    Ok(holds_any_role(&names, allowed))
}

/// Require chatboard access, or `Forbidden`.
pub async fn require_chatboard_access<G: GrantSource + ?Sized>(
    source: &G,
    user_id: Uuid,
    chatboard_id: Uuid,
) -> Result<(), PermissionError> {
    if has_access(source, user_id, chatboard_id).await? {
        Ok(())
    } else {
        Err(PermissionError::Forbidden)
    }
}

/// Require a global role from `allowed`, or `Forbidden`.
pub async fn require_any_role<G: GrantSource + ?Sized>(
    source: &G,
    user_id: Uuid,
    allowed: &[&str],
) -> Result<(), PermissionError> {
    if check_permission(source, user_id, allowed).await? {
        Ok(())
    } else {
        Err(PermissionError::Forbidden)
    }
}
