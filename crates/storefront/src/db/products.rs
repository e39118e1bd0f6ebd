//! Catalog repository.

use async_trait::async_trait;
use sqlx::PgPool;

use shonifity_core::{Product, ProductId};

use super::{NewProduct, ProductStore, RepositoryError};

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, category, image, is_featured, created_at";

/// `PostgreSQL`-backed [`ProductStore`].
#[derive(Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductStore for PgProductRepository {
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = ANY($1)"
        ))
        .bind(raw)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    async fn list_featured(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE is_featured ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    async fn list_by_category(&self, category: &str) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE category = $1 ORDER BY id"
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    async fn sample(&self, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product ORDER BY random() LIMIT $1"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    async fn upsert(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let saved = sqlx::query_as::<_, Product>(&format!(
            r"
            INSERT INTO storefront.product (name, description, price, category, image, is_featured)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (name) DO UPDATE SET
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                category = EXCLUDED.category,
                image = EXCLUDED.image,
                is_featured = EXCLUDED.is_featured
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.category)
        .bind(&product.image)
        .bind(product.is_featured)
        .fetch_one(&self.pool)
        .await?;

        Ok(saved)
    }
}
