//! Cart ledger.
//!
//! Each mutation loads the user's whole cart, applies the change and writes
//! the whole cart back. Mutations for the same user are serialised inside
//! this process by [`UserLocks`]; writers in other processes still race with
//! last-write-wins.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, instrument};

use shonifity_core::{Cart, CartMutationError, CartTotals, Product, ProductId, UserId};

use crate::db::{CartStore, ProductStore, RepositoryError};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product to add does not exist.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The cart owner does not exist.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error(transparent)]
    Mutation(#[from] CartMutationError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// A cart line joined with the current catalog product.
///
/// Serializes as the product's fields plus `quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedCartItem {
    #[serde(flatten)]
    pub product: Product,
    pub quantity: u32,
}

/// Per-user async mutexes. Idle entries expire after ten minutes.
#[derive(Clone)]
pub struct UserLocks {
    locks: Cache<UserId, Arc<Mutex<()>>>,
}

impl Default for UserLocks {
    fn default() -> Self {
        Self {
            locks: Cache::builder()
                .time_to_idle(Duration::from_secs(600))
                .build(),
        }
    }
}

impl UserLocks {
    /// Wait for exclusive access to `user`'s cart.
    pub async fn acquire(&self, user: UserId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .get_with(user, async { Arc::new(Mutex::new(())) })
            .await;
        lock.lock_owned().await
    }
}

/// Cart service.
#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartStore>,
    products: Arc<dyn ProductStore>,
    locks: UserLocks,
}

impl CartService {
    #[must_use]
    pub fn new(carts: Arc<dyn CartStore>, products: Arc<dyn ProductStore>) -> Self {
        Self {
            carts,
            products,
            locks: UserLocks::default(),
        }
    }

    async fn load(&self, user: UserId) -> Result<Cart, CartError> {
        self.carts.load(user).await.map_err(|e| match e {
            RepositoryError::NotFound => CartError::UserNotFound(user),
            other => CartError::Repository(other),
        })
    }

    async fn save(&self, user: UserId, cart: &Cart) -> Result<(), CartError> {
        self.carts.save(user, cart).await.map_err(|e| match e {
            RepositoryError::NotFound => CartError::UserNotFound(user),
            other => CartError::Repository(other),
        })
    }

    /// Raw stored cart, including entries that no longer resolve.
    ///
    /// # Errors
    ///
    /// Returns `CartError::UserNotFound` for an unknown user.
    pub async fn raw_cart(&self, user: UserId) -> Result<Cart, CartError> {
        self.load(user).await
    }

    /// Add one unit of `product`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` if the product does not exist.
    #[instrument(skip(self), fields(user_id = %user, product_id = %product))]
    pub async fn add_item(&self, user: UserId, product: ProductId) -> Result<Cart, CartError> {
        if self.products.get(product).await?.is_none() {
            return Err(CartError::ProductNotFound(product));
        }

        let _guard = self.locks.acquire(user).await;
        let mut cart = self.load(user).await?;
        cart.add(product);
        self.save(user, &cart).await?;
        Ok(cart)
    }

    /// Remove `product`, or empty the cart when `product` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be loaded or saved.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn remove_item(
        &self,
        user: UserId,
        product: Option<ProductId>,
    ) -> Result<Cart, CartError> {
        let _guard = self.locks.acquire(user).await;
        let mut cart = self.load(user).await?;
        match product {
            Some(product) => cart.remove(product),
            None => cart.clear(),
        }
        self.save(user, &cart).await?;
        Ok(cart)
    }

    /// Replace the quantity of a product already in the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Mutation` for a negative or oversized quantity or
    /// a product that is not in the cart.
    #[instrument(skip(self), fields(user_id = %user, product_id = %product))]
    pub async fn set_quantity(
        &self,
        user: UserId,
        product: ProductId,
        quantity: i64,
    ) -> Result<Cart, CartError> {
        let _guard = self.locks.acquire(user).await;
        let mut cart = self.load(user).await?;
        cart.set_quantity(product, quantity)?;
        self.save(user, &cart).await?;
        Ok(cart)
    }

    /// Valid cart entries joined with current catalog data, in cart order.
    ///
    /// Entries whose product no longer exists are skipped; storage is not
    /// modified.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart or products cannot be loaded.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn price_cart(&self, user: UserId) -> Result<Vec<PricedCartItem>, CartError> {
        let cart = self.load(user).await?;
        let ids = cart.product_ids();
        let products: HashMap<ProductId, Product> = self
            .products
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        Ok(cart
            .valid_items()
            .filter_map(|item| {
                products.get(&item.product).map(|product| PricedCartItem {
                    product: product.clone(),
                    quantity: item.quantity,
                })
            })
            .collect())
    }

    /// Subtotal and total of the priced cart with an optional percent discount.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be priced.
    pub async fn summary(
        &self,
        user: UserId,
        discount_percentage: Option<u8>,
    ) -> Result<CartTotals, CartError> {
        let items = self.price_cart(user).await?;
        Ok(CartTotals::compute(
            items.iter().map(|i| (i.product.price, i.quantity)),
            discount_percentage,
        ))
    }

    /// Strip invalid entries from every stored cart.
    ///
    /// Returns the number of users whose cart changed.
    ///
    /// # Errors
    ///
    /// Returns the first load or save error.
    #[instrument(skip(self))]
    pub async fn cleanup_all(&self) -> Result<usize, CartError> {
        let mut updated = 0;
        for (user, _) in self.carts.list_non_empty().await? {
            let _guard = self.locks.acquire(user).await;
            let mut cart = self.load(user).await?;
            if cart.strip_invalid() {
                self.save(user, &cart).await?;
                updated += 1;
            }
        }
        info!(users_updated = updated, "Cart cleanup finished");
        Ok(updated)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use rust_decimal::Decimal;
    use shonifity_core::{StoredCartItem, UserRole};

    use super::*;
    use crate::db::{InMemoryStore, NewProduct};

    struct Fixture {
        store: Arc<InMemoryStore>,
        service: CartService,
        user: UserId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let user = store.add_user("Ann", "ann@example.com", UserRole::Customer).await;
        let service = CartService::new(store.clone(), store.clone());
        Fixture { store, service, user }
    }

    async fn product(store: &InMemoryStore, name: &str, price: i64) -> ProductId {
        store
            .upsert(NewProduct {
                name: name.to_string(),
                description: String::new(),
                price: Decimal::from(price),
                category: "misc".to_string(),
                image: String::new(),
                is_featured: false,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_add_twice_yields_one_entry() {
        let f = fixture().await;
        let p = product(&f.store, "Tee", 20).await;

        f.service.add_item(f.user, p).await.unwrap();
        let cart = f.service.add_item(f.user, p).await.unwrap();

        assert_eq!(cart.items(), &[StoredCartItem::new(p, 2)]);
    }

    #[tokio::test]
    async fn test_add_unknown_product_is_rejected() {
        let f = fixture().await;
        let result = f.service.add_item(f.user, ProductId::new(999)).await;

        assert!(matches!(result, Err(CartError::ProductNotFound(_))));
        assert!(f.service.raw_cart(f.user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_quantity_zero_equals_remove() {
        let f = fixture().await;
        let twin = f.store.add_user("Bo", "bo@example.com", UserRole::Customer).await;
        let a = product(&f.store, "A", 10).await;
        let b = product(&f.store, "B", 10).await;
        for user in [f.user, twin] {
            f.service.add_item(user, a).await.unwrap();
            f.service.add_item(user, b).await.unwrap();
        }

        let via_update = f.service.set_quantity(f.user, a, 0).await.unwrap();
        let via_remove = f.service.remove_item(twin, Some(a)).await.unwrap();

        assert_eq!(via_update, via_remove);
        assert_eq!(via_update.product_ids(), vec![b]);
    }

    #[tokio::test]
    async fn test_set_quantity_errors() {
        let f = fixture().await;
        let a = product(&f.store, "A", 10).await;
        f.service.add_item(f.user, a).await.unwrap();

        let negative = f.service.set_quantity(f.user, a, -3).await;
        assert!(matches!(
            negative,
            Err(CartError::Mutation(CartMutationError::NegativeQuantity(-3)))
        ));

        let missing = f.service.set_quantity(f.user, ProductId::new(777), 2).await;
        assert!(matches!(
            missing,
            Err(CartError::Mutation(CartMutationError::NotInCart(_)))
        ));
    }

    #[tokio::test]
    async fn test_remove_without_product_clears() {
        let f = fixture().await;
        for name in ["A", "B", "C"] {
            let p = product(&f.store, name, 5).await;
            f.service.add_item(f.user, p).await.unwrap();
        }

        let cart = f.service.remove_item(f.user, None).await.unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_price_cart_uses_current_prices_and_skips_deleted() {
        let f = fixture().await;
        let jeans = product(&f.store, "Jeans", 50).await;
        let cap = product(&f.store, "Cap", 30).await;
        let gone = product(&f.store, "Gone", 99).await;
        f.service.add_item(f.user, jeans).await.unwrap();
        f.service.add_item(f.user, jeans).await.unwrap();
        f.service.add_item(f.user, cap).await.unwrap();
        f.service.add_item(f.user, gone).await.unwrap();
        f.store.remove_product(gone).await;

        let items = f.service.price_cart(f.user).await.unwrap();
        let lines: Vec<(ProductId, u32)> = items.iter().map(|i| (i.product.id, i.quantity)).collect();
        assert_eq!(lines, vec![(jeans, 2), (cap, 1)]);

        // Storage still holds the dangling entry.
        assert_eq!(f.service.raw_cart(f.user).await.unwrap().len(), 3);

        let totals = f.service.summary(f.user, None).await.unwrap();
        assert_eq!(totals.subtotal, Decimal::new(13000, 2));
        let discounted = f.service.summary(f.user, Some(10)).await.unwrap();
        assert_eq!(discounted.total, Decimal::new(11700, 2));
    }

    #[tokio::test]
    async fn test_cleanup_counts_only_changed_carts() {
        let f = fixture().await;
        let other = f.store.add_user("Bo", "bo@example.com", UserRole::Customer).await;
        let p = product(&f.store, "A", 10).await;

        f.store
            .save(
                f.user,
                &Cart::new(vec![
                    StoredCartItem::new(p, 1),
                    StoredCartItem { product: None, quantity: 2 },
                ]),
            )
            .await
            .unwrap();
        f.store
            .save(other, &Cart::new(vec![StoredCartItem::new(p, 1)]))
            .await
            .unwrap();

        assert_eq!(f.service.cleanup_all().await.unwrap(), 1);
        assert_eq!(f.service.raw_cart(f.user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_stored_entries_are_skipped_then_stripped() {
        let f = fixture().await;
        let p = product(&f.store, "A", 10).await;
        let stored: Cart = serde_json::from_str(&format!(
            r#"[{{"product": {p}, "quantity": 2}}, null, {{"product": "x"}}, {{"product": {p}, "quantity": 0.5}}]"#
        ))
        .unwrap();
        f.store.save(f.user, &stored).await.unwrap();

        let priced = f.service.price_cart(f.user).await.unwrap();
        assert_eq!(priced.len(), 1);
        assert_eq!(priced[0].quantity, 2);

        assert_eq!(f.service.cleanup_all().await.unwrap(), 1);
        assert_eq!(
            f.service.raw_cart(f.user).await.unwrap().items(),
            &[StoredCartItem::new(p, 2)]
        );
    }

    #[tokio::test]
    async fn test_quantity_above_maximum_is_rejected() {
        let f = fixture().await;
        let p = product(&f.store, "A", 10).await;
        f.service.add_item(f.user, p).await.unwrap();

        let result = f.service.set_quantity(f.user, p, 5_000_000_000).await;
        assert!(matches!(
            result,
            Err(CartError::Mutation(CartMutationError::QuantityTooLarge(5_000_000_000)))
        ));
        assert_eq!(
            f.service.raw_cart(f.user).await.unwrap().items(),
            &[StoredCartItem::new(p, 1)]
        );
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() {
        let f = fixture().await;
        let p = product(&f.store, "A", 10).await;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let service = f.service.clone();
            let user = f.user;
            handles.push(tokio::spawn(async move { service.add_item(user, p).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let cart = f.service.raw_cart(f.user).await.unwrap();
        assert_eq!(cart.items(), &[StoredCartItem::new(p, 20)]);
    }
}
