//! Session middleware configuration.
//!
//! Sessions are issued by the auth service into the shared `PostgreSQL`
//! store; this layer loads them from the `shon_session` cookie.

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "shon_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer over the shared `PostgreSQL` store.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    // The sessions table is created by migration
    let store = PostgresStore::new(pool.clone());
    session_layer(store, config.client_url.starts_with("https://"))
}

/// Session layer over any store with the storefront's cookie settings.
#[must_use]
pub fn session_layer<S: SessionStore + Clone>(store: S, secure: bool) -> SessionManagerLayer<S> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(secure)
        // Cross-site requests from the SPA origin carry the cookie.
        .with_same_site(if secure {
            tower_sessions::cookie::SameSite::None
        } else {
            tower_sessions::cookie::SameSite::Lax
        })
        .with_http_only(true)
        .with_path("/")
}
