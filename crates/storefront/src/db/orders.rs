//! Order repository.
//!
//! `stripe_session_id` carries a unique constraint; an insert that violates it
//! surfaces as [`RepositoryError::Conflict`] so checkout can recover the
//! existing order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use shonifity_core::{CurrencyCode, Order, OrderId, OrderLine, UserId};

use super::{NewOrder, OrderStore, RepositoryError, map_unique_violation};

/// `PostgreSQL`-backed [`OrderStore`].
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    products: Json<Vec<OrderLine>>,
    total_amount: Decimal,
    currency: String,
    stripe_session_id: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let currency = row.currency.parse::<CurrencyCode>().map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            products: row.products.0,
            total_amount: row.total_amount,
            currency,
            stripe_session_id: row.stripe_session_id,
            created_at: row.created_at,
        })
    }
}

const ORDER_COLUMNS: &str =
    "id, user_id, products, total_amount, currency, stripe_session_id, created_at";

#[async_trait]
impl OrderStore for PgOrderRepository {
    async fn find_by_session(&self, session_id: &str) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.order WHERE stripe_session_id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn insert(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO storefront.order
                (user_id, products, total_amount, currency, stripe_session_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.user_id)
        .bind(Json(&order.products))
        .bind(order.total_amount)
        .bind(order.currency.code())
        .bind(&order.stripe_session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "order for this session already exists"))?;

        row.try_into()
    }

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.order \
             WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }
}
