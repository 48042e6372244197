//! Authentication Middleware

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::api::AppState;
use crate::permissions::{coarse_role, GrantSource};

use super::error::AuthError;
use super::jwt::validate_access_token;

/// Authenticated user injected into request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// User ID from the token subject.
    pub id: Uuid,
    /// Highest coarse role ("Admin" or "Head Unicorn"), if any.
    pub role: Option<String>,
}

/// Extract the token from an `Authorization` header value.
///
/// The value must be exactly `Bearer <token>` with a single space and a
/// token containing no whitespace.
pub fn parse_bearer(header: &str) -> Result<&str, AuthError> {
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeader)?;

    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AuthError::InvalidAuthHeader);
    }

    Ok(token)
}

/// Middleware to require authentication.
///
/// Validates the Bearer token, resolves the user's coarse role and injects
/// `AuthUser` into request extensions.
///
/// # Usage
///
/// ```ignore
/// Router::new()
///     .route("/protected", get(handler))
///     .layer(axum::middleware::from_fn_with_state(state, require_auth))
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let token = parse_bearer(auth_header)?;
    let claims = validate_access_token(token, &state.config.jwt_secret)?;
    let user_id = claims.user_id()?;

    let roles = state.db.global_role_names(user_id).await?;
    let auth_user = AuthUser {
        id: user_id,
        role: coarse_role(&roles).map(str::to_string),
    };

    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Extractor for authenticated user in handlers.
///
/// ```ignore
/// async fn protected_handler(auth_user: AuthUser) -> impl IntoResponse {
///     format!("Hello, {}!", auth_user.id)
/// }
/// ```
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(AuthError::MissingAuthHeader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer_accepts_exact_form() {
        assert_eq!(parse_bearer("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_parse_bearer_rejects_malformed_headers() {
        for header in [
            "",
            "Bearer",
            "Bearer ",
            "bearer abc",
            "Basic abc",
            "Bearer  abc",
            "Bearer abc def",
            "Bearer abc\t",
            "Token abc",
            "abc",
        ] {
            assert!(
                matches!(parse_bearer(header), Err(AuthError::InvalidAuthHeader)),
                "{header:?} must be rejected"
            );
        }
    }
}
