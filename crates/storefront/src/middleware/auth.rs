//! Authentication extractors.
//!
//! The auth service signs users in and writes [`CurrentUser`] into the shared
//! session; these extractors only read it.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::error::{AppError, set_sentry_user};
use crate::models::CurrentUser;
use crate::models::session::keys;

/// Extractor that requires a signed-in user.
///
/// Rejects with a JSON 401 when there is no session user.
///
/// # Example
///
/// ```rust,ignore
/// async fn get_cart(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("cart of user {}", user.id)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = current_user(parts)
            .await
            .ok_or_else(|| AppError::Unauthorized("Unauthorized - No access token provided".to_string()))?;

        set_sentry_user(&user.id);
        tracing::Span::current().record("user_id", user.id.as_i32());
        Ok(Self(user))
    }
}

/// Extractor that requires a signed-in admin.
///
/// 401 without a session user, 403 for non-admins.
pub struct RequireAdmin(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Forbidden("Access denied - Admin only".to_string()));
        }
        Ok(Self(user))
    }
}

async fn current_user(parts: &Parts) -> Option<CurrentUser> {
    // Set by SessionManagerLayer
    let session = parts.extensions.get::<Session>()?;
    match session.get::<CurrentUser>(keys::CURRENT_USER).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable session user");
            None
        }
    }
}
