//! Database operations for storefront `PostgreSQL`.
//!
//! # Schema: `storefront`
//!
//! ## Tables
//!
//! - `user` - Accounts (owned by the auth service) with the cart embedded as JSONB
//! - `product` - Catalog
//! - `coupon` - Per-user gift coupons, at most one active per user
//! - `order` - Paid checkout sessions, unique by `stripe_session_id`
//!
//! Sessions live in `tower_sessions.session`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p shonifity-cli -- migrate
//! ```
//!
//! Every store is a trait so services can run against Postgres in production
//! and [`memory::InMemoryStore`] in tests.

pub mod analytics;
pub mod carts;
pub mod coupons;
pub mod memory;
pub mod orders;
pub mod products;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use shonifity_core::{
    Cart, Coupon, CurrencyCode, Order, OrderLine, Product, ProductId, UserId,
};

pub use analytics::{CategoryCount, OrderSummary, PgAnalyticsRepository, ProductSummary, UserSummary};
pub use carts::PgCartRepository;
pub use coupons::PgCouponRepository;
pub use memory::InMemoryStore;
pub use orders::PgOrderRepository;
pub use products::PgProductRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate session ID).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique violation to `Conflict`, everything else to `Database`.
pub(crate) fn map_unique_violation(err: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(what.to_string());
    }
    RepositoryError::Database(err)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Product fields supplied when seeding the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category: String,
    pub image: String,
    #[serde(default)]
    pub is_featured: bool,
}

/// Coupon fields supplied when issuing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCoupon {
    pub code: String,
    pub discount_percentage: u8,
    pub user_id: UserId,
    pub expiration_date: DateTime<Utc>,
}

/// Order fields supplied when confirming a paid session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub products: Vec<OrderLine>,
    pub total_amount: Decimal,
    pub currency: CurrencyCode,
    pub stripe_session_id: String,
}

/// Read access to the catalog, plus upsert for seeding.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Fetch several products at once. Unknown IDs are skipped; order is unspecified.
    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError>;

    async fn list_featured(&self) -> Result<Vec<Product>, RepositoryError>;

    async fn list_by_category(&self, category: &str) -> Result<Vec<Product>, RepositoryError>;

    /// Up to `limit` products in random order.
    async fn sample(&self, limit: u32) -> Result<Vec<Product>, RepositoryError>;

    /// Insert a product, or update the existing one with the same name.
    async fn upsert(&self, product: NewProduct) -> Result<Product, RepositoryError>;
}

/// Per-user cart persistence.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Load a user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    async fn load(&self, user: UserId) -> Result<Cart, RepositoryError>;

    /// Replace a user's cart as a whole.
    async fn save(&self, user: UserId, cart: &Cart) -> Result<(), RepositoryError>;

    /// Every user whose stored cart is non-empty.
    async fn list_non_empty(&self) -> Result<Vec<(UserId, Cart)>, RepositoryError>;
}

/// Coupon persistence.
#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Delete every coupon the user holds and insert `coupon`, atomically.
    async fn replace_for_user(&self, coupon: NewCoupon) -> Result<Coupon, RepositoryError>;

    /// The active coupon with this code owned by `user`.
    async fn find_active(&self, code: &str, user: UserId) -> Result<Option<Coupon>, RepositoryError>;

    /// The user's active coupon, if any.
    async fn active_for_user(&self, user: UserId) -> Result<Option<Coupon>, RepositoryError>;

    /// Mark the matching coupon inactive. Returns `false` if nothing matched.
    async fn deactivate(&self, code: &str, user: UserId) -> Result<bool, RepositoryError>;
}

/// Order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_session(&self, session_id: &str) -> Result<Option<Order>, RepositoryError>;

    /// Insert an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if an order with the same
    /// `stripe_session_id` already exists.
    async fn insert(&self, order: NewOrder) -> Result<Order, RepositoryError>;

    /// A user's orders, newest first.
    async fn list_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError>;
}

/// Read-only aggregate queries behind the chatbot's live-data answers.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn count_users(&self) -> Result<i64, RepositoryError>;

    async fn recent_users(&self, limit: u32) -> Result<Vec<UserSummary>, RepositoryError>;

    async fn count_products(&self) -> Result<i64, RepositoryError>;

    async fn featured_products(&self) -> Result<Vec<ProductSummary>, RepositoryError>;

    async fn recent_products(&self, limit: u32) -> Result<Vec<ProductSummary>, RepositoryError>;

    /// Product counts grouped by category, largest first.
    async fn products_by_category(&self) -> Result<Vec<CategoryCount>, RepositoryError>;

    /// Orders created at or after `since` (all orders when `None`).
    async fn count_orders(&self, since: Option<DateTime<Utc>>) -> Result<i64, RepositoryError>;

    async fn recent_orders(&self, limit: u32) -> Result<Vec<OrderSummary>, RepositoryError>;

    /// Sum of order totals at or after `since` (all orders when `None`).
    async fn revenue(&self, since: Option<DateTime<Utc>>) -> Result<Decimal, RepositoryError>;
}
