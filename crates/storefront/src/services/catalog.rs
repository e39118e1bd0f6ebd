//! Catalog reads.
//!
//! The featured list is cached for 5 minutes. Single-product and batch
//! lookups always hit the store: carts and checkout must see current prices.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, instrument};

use shonifity_core::{Product, ProductId};

use crate::db::{NewProduct, ProductStore, RepositoryError};

/// Number of products returned by recommendations.
pub const RECOMMENDATION_COUNT: u32 = 4;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Featured,
}

/// Catalog service.
#[derive(Clone)]
pub struct CatalogService {
    inner: Arc<CatalogServiceInner>,
}

struct CatalogServiceInner {
    products: Arc<dyn ProductStore>,
    cache: Cache<CacheKey, Arc<Vec<Product>>>,
}

impl CatalogService {
    #[must_use]
    pub fn new(products: Arc<dyn ProductStore>) -> Self {
        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            inner: Arc::new(CatalogServiceInner { products, cache }),
        }
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get(&self, id: ProductId) -> Result<Product, RepositoryError> {
        self.inner
            .products
            .get(id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Every product.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        self.inner.products.list_all().await
    }

    /// Featured products, served from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn list_featured(&self) -> Result<Arc<Vec<Product>>, RepositoryError> {
        if let Some(featured) = self.inner.cache.get(&CacheKey::Featured).await {
            debug!("Cache hit for featured products");
            return Ok(featured);
        }

        let featured = Arc::new(self.inner.products.list_featured().await?);
        self.inner
            .cache
            .insert(CacheKey::Featured, Arc::clone(&featured))
            .await;
        Ok(featured)
    }

    /// Products in one category.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    #[instrument(skip(self))]
    pub async fn list_by_category(&self, category: &str) -> Result<Vec<Product>, RepositoryError> {
        self.inner.products.list_by_category(category).await
    }

    /// A random handful of products.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub async fn recommendations(&self) -> Result<Vec<Product>, RepositoryError> {
        self.inner.products.sample(RECOMMENDATION_COUNT).await
    }

    /// Insert or update products by name and drop the featured cache.
    ///
    /// # Errors
    ///
    /// Returns the first store error; earlier products stay saved.
    pub async fn seed(&self, products: Vec<NewProduct>) -> Result<Vec<Product>, RepositoryError> {
        let mut saved = Vec::with_capacity(products.len());
        for product in products {
            saved.push(self.inner.products.upsert(product).await?);
        }
        self.invalidate().await;
        Ok(saved)
    }

    /// Drop all cached lists.
    pub async fn invalidate(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::InMemoryStore;

    fn new_product(name: &str, featured: bool) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: String::new(),
            price: Decimal::from(25),
            category: "bags".to_string(),
            image: String::new(),
            is_featured: featured,
        }
    }

    #[tokio::test]
    async fn test_featured_is_cached_until_invalidated() {
        let store = Arc::new(InMemoryStore::new());
        let catalog = CatalogService::new(store.clone());
        store.upsert(new_product("Tote", true)).await.unwrap();

        assert_eq!(catalog.list_featured().await.unwrap().len(), 1);

        store.upsert(new_product("Clutch", true)).await.unwrap();
        assert_eq!(catalog.list_featured().await.unwrap().len(), 1);

        catalog.invalidate().await;
        assert_eq!(catalog.list_featured().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_unknown_product_is_not_found() {
        let catalog = CatalogService::new(Arc::new(InMemoryStore::new()));
        let result = catalog.get(ProductId::new(99)).await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_recommendations_are_capped() {
        let store = Arc::new(InMemoryStore::new());
        let catalog = CatalogService::new(store.clone());
        for i in 0..6 {
            store.upsert(new_product(&format!("Bag {i}"), false)).await.unwrap();
        }

        assert_eq!(catalog.recommendations().await.unwrap().len(), 4);
    }
}
