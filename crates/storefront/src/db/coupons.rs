//! Coupon repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use shonifity_core::{Coupon, CouponId, UserId};

use super::{CouponStore, NewCoupon, RepositoryError, map_unique_violation};

/// `PostgreSQL`-backed [`CouponStore`].
#[derive(Clone)]
pub struct PgCouponRepository {
    pool: PgPool,
}

impl PgCouponRepository {
    /// Create a new coupon repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: CouponId,
    code: String,
    discount_percentage: i16,
    user_id: UserId,
    is_active: bool,
    expiration_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = RepositoryError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        let discount_percentage = u8::try_from(row.discount_percentage)
            .ok()
            .filter(|pct| *pct <= 100)
            .ok_or_else(|| {
                RepositoryError::DataCorruption(format!(
                    "coupon {} has discount {}",
                    row.id, row.discount_percentage
                ))
            })?;

        Ok(Self {
            id: row.id,
            code: row.code,
            discount_percentage,
            user_id: row.user_id,
            is_active: row.is_active,
            expiration_date: row.expiration_date,
            created_at: row.created_at,
        })
    }
}

const COUPON_COLUMNS: &str =
    "id, code, discount_percentage, user_id, is_active, expiration_date, created_at";

#[async_trait]
impl CouponStore for PgCouponRepository {
    async fn replace_for_user(&self, coupon: NewCoupon) -> Result<Coupon, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM storefront.coupon WHERE user_id = $1")
            .bind(coupon.user_id)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, CouponRow>(&format!(
            r"
            INSERT INTO storefront.coupon (code, discount_percentage, user_id, expiration_date)
            VALUES ($1, $2, $3, $4)
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(&coupon.code)
        .bind(i16::from(coupon.discount_percentage))
        .bind(coupon.user_id)
        .bind(coupon.expiration_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "coupon code already exists"))?;

        tx.commit().await?;

        row.try_into()
    }

    async fn find_active(&self, code: &str, user: UserId) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM storefront.coupon \
             WHERE code = $1 AND user_id = $2 AND is_active"
        ))
        .bind(code)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Coupon::try_from).transpose()
    }

    async fn active_for_user(&self, user: UserId) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM storefront.coupon WHERE user_id = $1 AND is_active"
        ))
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Coupon::try_from).transpose()
    }

    async fn deactivate(&self, code: &str, user: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE storefront.coupon SET is_active = FALSE \
             WHERE code = $1 AND user_id = $2 AND is_active",
        )
        .bind(code)
        .bind(user)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
