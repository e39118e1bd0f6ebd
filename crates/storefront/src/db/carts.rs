//! Cart persistence on the user row.
//!
//! The cart is a JSONB array on `storefront.user` and is always written whole,
//! so a save replaces whatever the row held before.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;

use shonifity_core::{Cart, UserId};

use super::{CartStore, RepositoryError};

/// `PostgreSQL`-backed [`CartStore`].
#[derive(Clone)]
pub struct PgCartRepository {
    pool: PgPool,
}

impl PgCartRepository {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: UserId,
    cart_items: Json<Cart>,
}

#[async_trait]
impl CartStore for PgCartRepository {
    async fn load(&self, user: UserId) -> Result<Cart, RepositoryError> {
        let row: Option<(Json<Cart>,)> =
            sqlx::query_as("SELECT cart_items FROM storefront.user WHERE id = $1")
                .bind(user)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(Json(cart),)| cart).ok_or(RepositoryError::NotFound)
    }

    async fn save(&self, user: UserId, cart: &Cart) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE storefront.user SET cart_items = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(user)
        .bind(Json(cart))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_non_empty(&self) -> Result<Vec<(UserId, Cart)>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartRow>(
            "SELECT id, cart_items FROM storefront.user \
             WHERE jsonb_array_length(cart_items) > 0 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.id, row.cart_items.0))
            .collect())
    }
}
