//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Database ping
//!
//! # Products (public)
//! GET  /api/products                    - All products
//! GET  /api/products/featured           - Featured products (cached)
//! GET  /api/products/recommendations    - Four random products
//! GET  /api/products/category/{category}
//! GET  /api/products/{id}
//!
//! # Cart (requires auth)
//! GET    /api/cart                      - Priced cart
//! POST   /api/cart                      - Add one unit {productId}
//! DELETE /api/cart                      - Remove {productId} or clear
//! PUT    /api/cart/{id}                 - Set quantity {quantity}
//! GET    /api/cart/summary?couponCode=  - Totals
//! POST   /api/cart/cleanup              - Strip invalid entries (admin)
//!
//! # Coupons (requires auth)
//! GET  /api/coupons                     - Active coupon or null
//! POST /api/coupons/validate            - {code}
//!
//! # Payments (requires auth)
//! POST /api/payments/create-checkout-session
//! POST /api/payments/checkout-success
//!
//! # Orders (requires auth)
//! GET  /api/orders
//!
//! # Chatbot (public, rate limited)
//! POST /api/chatbot/message
//! GET  /api/chatbot/suggestions?query=
//! GET  /api/chatbot/health
//! ```

pub mod cart;
pub mod chatbot;
pub mod coupons;
pub mod orders;
pub mod payments;
pub mod products;

use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::state::AppState;

/// Every `/api` route.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/products", products::router())
        .nest("/cart", cart::router())
        .nest("/coupons", coupons::router())
        .nest("/payments", payments::router())
        .nest("/orders", orders::router())
        .nest("/chatbot", chatbot::router())
}

/// Health checks, outside `/api`.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable. In-memory
/// backends are always ready.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    let Some(pool) = state.pool() else {
        return StatusCode::OK;
    };
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
