//! Aggregate queries for live-data chatbot answers.
//!
//! Everything here is read-only and returns small summary rows rather than
//! full entities.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use super::{AnalyticsStore, RepositoryError};

/// A user in a "recent users" listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// A product in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ProductSummary {
    pub name: String,
    pub price: Decimal,
    pub category: String,
}

/// An order in a "recent orders" listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub total_amount: Decimal,
    /// `None` when the purchasing user no longer exists.
    pub customer_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Number of products in one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

/// `PostgreSQL`-backed [`AnalyticsStore`].
#[derive(Clone)]
pub struct PgAnalyticsRepository {
    pool: PgPool,
}

impl PgAnalyticsRepository {
    /// Create a new analytics repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn scalar_count(&self, sql: &str) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}

#[async_trait]
impl AnalyticsStore for PgAnalyticsRepository {
    async fn count_users(&self) -> Result<i64, RepositoryError> {
        self.scalar_count("SELECT COUNT(*) FROM storefront.user").await
    }

    async fn recent_users(&self, limit: u32) -> Result<Vec<UserSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserSummary>(
            "SELECT name, email, created_at FROM storefront.user \
             ORDER BY created_at DESC LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_products(&self) -> Result<i64, RepositoryError> {
        self.scalar_count("SELECT COUNT(*) FROM storefront.product").await
    }

    async fn featured_products(&self) -> Result<Vec<ProductSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductSummary>(
            "SELECT name, price, category FROM storefront.product WHERE is_featured ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn recent_products(&self, limit: u32) -> Result<Vec<ProductSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductSummary>(
            "SELECT name, price, category FROM storefront.product \
             ORDER BY created_at DESC LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn products_by_category(&self) -> Result<Vec<CategoryCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryCount>(
            "SELECT category, COUNT(*) AS count FROM storefront.product \
             GROUP BY category ORDER BY count DESC, category",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_orders(&self, since: Option<DateTime<Utc>>) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM storefront.order WHERE $1::timestamptz IS NULL OR created_at >= $1",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn recent_orders(&self, limit: u32) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderSummary>(
            r"
            SELECT o.total_amount, u.name AS customer_name, o.created_at
            FROM storefront.order o
            LEFT JOIN storefront.user u ON u.id = o.user_id
            ORDER BY o.created_at DESC
            LIMIT $1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn revenue(&self, since: Option<DateTime<Utc>>) -> Result<Decimal, RepositoryError> {
        let total: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_amount), 0) FROM storefront.order \
             WHERE $1::timestamptz IS NULL OR created_at >= $1",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }
}
