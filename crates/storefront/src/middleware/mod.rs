//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS (SPA origin with credentials)
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//! 6. Rate limiting on chatbot routes (governor)

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use auth::{RequireAdmin, RequireAuth};
pub use rate_limit::chatbot_rate_limiter;
pub use request_id::request_id_middleware;
pub use session::{SESSION_COOKIE_NAME, create_session_layer, session_layer};
