//! In-memory implementation of every store.
//!
//! Used by the test suites and for running the API without a database. One
//! [`InMemoryStore`] holds users, products, coupons and orders behind a single
//! lock, so the constraints the Postgres schema enforces (unique session IDs,
//! one active coupon per user) are checked here too.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use shonifity_core::{
    Cart, Coupon, CouponId, Order, OrderId, Product, ProductId, UserId, UserRole,
};

use super::{
    AnalyticsStore, CartStore, CategoryCount, CouponStore, NewCoupon, NewOrder, NewProduct,
    OrderStore, OrderSummary, ProductStore, ProductSummary, RepositoryError, UserSummary,
};

#[derive(Debug, Clone)]
struct MemoryUser {
    name: String,
    email: String,
    role: UserRole,
    cart: Cart,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, MemoryUser>,
    products: BTreeMap<ProductId, Product>,
    coupons: Vec<Coupon>,
    orders: Vec<Order>,
    next_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Store backed by process memory.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    fail_writes: RwLock<bool>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a database error.
    pub async fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write().await = fail;
    }

    async fn check_writable(&self) -> Result<(), RepositoryError> {
        if *self.fail_writes.read().await {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    /// Register a user with an empty cart.
    pub async fn add_user(&self, name: &str, email: &str, role: UserRole) -> UserId {
        let mut tables = self.tables.write().await;
        let id = UserId::new(tables.next_id());
        tables.users.insert(
            id,
            MemoryUser {
                name: name.to_string(),
                email: email.to_string(),
                role,
                cart: Cart::default(),
                created_at: Utc::now(),
            },
        );
        id
    }

    /// Role of a registered user.
    pub async fn role_of(&self, user: UserId) -> Option<UserRole> {
        self.tables.read().await.users.get(&user).map(|u| u.role)
    }

    /// Delete a product, leaving any cart entries that reference it.
    pub async fn remove_product(&self, id: ProductId) -> Option<Product> {
        self.tables.write().await.products.remove(&id)
    }

    /// Every coupon ever stored for `user`, active or not.
    pub async fn coupons_for(&self, user: UserId) -> Vec<Coupon> {
        self.tables
            .read()
            .await
            .coupons
            .iter()
            .filter(|c| c.user_id == user)
            .cloned()
            .collect()
    }

    /// All stored orders in insertion order.
    pub async fn orders(&self) -> Vec<Order> {
        self.tables.read().await.orders.clone()
    }
}

fn product_summary(product: &Product) -> ProductSummary {
    ProductSummary {
        name: product.name.clone(),
        price: product.price,
        category: product.category.clone(),
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.products.get(id).cloned())
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.tables.read().await.products.values().cloned().collect())
    }

    async fn list_featured(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .products
            .values()
            .filter(|p| p.is_featured)
            .cloned()
            .collect())
    }

    async fn list_by_category(&self, category: &str) -> Result<Vec<Product>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .products
            .values()
            .filter(|p| p.category == category)
            .cloned()
            .collect())
    }

    async fn sample(&self, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        let mut products: Vec<Product> =
            self.tables.read().await.products.values().cloned().collect();
        products.shuffle(&mut rand::rng());
        products.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(products)
    }

    async fn upsert(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        self.check_writable().await?;
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables
            .products
            .values_mut()
            .find(|p| p.name == product.name)
        {
            existing.description = product.description;
            existing.price = product.price;
            existing.category = product.category;
            existing.image = product.image;
            existing.is_featured = product.is_featured;
            return Ok(existing.clone());
        }

        let id = ProductId::new(tables.next_id());
        let saved = Product {
            id,
            name: product.name,
            description: product.description,
            price: product.price,
            category: product.category,
            image: product.image,
            is_featured: product.is_featured,
            created_at: Utc::now(),
        };
        tables.products.insert(id, saved.clone());
        Ok(saved)
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn load(&self, user: UserId) -> Result<Cart, RepositoryError> {
        self.tables
            .read()
            .await
            .users
            .get(&user)
            .map(|u| u.cart.clone())
            .ok_or(RepositoryError::NotFound)
    }

    async fn save(&self, user: UserId, cart: &Cart) -> Result<(), RepositoryError> {
        self.check_writable().await?;
        let mut tables = self.tables.write().await;
        let stored = tables.users.get_mut(&user).ok_or(RepositoryError::NotFound)?;
        stored.cart = cart.clone();
        Ok(())
    }

    async fn list_non_empty(&self) -> Result<Vec<(UserId, Cart)>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .iter()
            .filter(|(_, u)| !u.cart.is_empty())
            .map(|(id, u)| (*id, u.cart.clone()))
            .collect())
    }
}

#[async_trait]
impl CouponStore for InMemoryStore {
    async fn replace_for_user(&self, coupon: NewCoupon) -> Result<Coupon, RepositoryError> {
        self.check_writable().await?;
        let mut tables = self.tables.write().await;

        if tables
            .coupons
            .iter()
            .any(|c| c.code == coupon.code && c.user_id != coupon.user_id)
        {
            return Err(RepositoryError::Conflict(
                "coupon code already exists".to_string(),
            ));
        }

        tables.coupons.retain(|c| c.user_id != coupon.user_id);
        let id = CouponId::new(tables.next_id());
        let saved = Coupon {
            id,
            code: coupon.code,
            discount_percentage: coupon.discount_percentage,
            user_id: coupon.user_id,
            is_active: true,
            expiration_date: coupon.expiration_date,
            created_at: Utc::now(),
        };
        tables.coupons.push(saved.clone());
        Ok(saved)
    }

    async fn find_active(&self, code: &str, user: UserId) -> Result<Option<Coupon>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .coupons
            .iter()
            .find(|c| c.applies_to(code, user))
            .cloned())
    }

    async fn active_for_user(&self, user: UserId) -> Result<Option<Coupon>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .coupons
            .iter()
            .find(|c| c.is_active && c.user_id == user)
            .cloned())
    }

    async fn deactivate(&self, code: &str, user: UserId) -> Result<bool, RepositoryError> {
        self.check_writable().await?;
        let mut tables = self.tables.write().await;
        let mut changed = false;
        for coupon in tables.coupons.iter_mut().filter(|c| c.applies_to(code, user)) {
            coupon.is_active = false;
            changed = true;
        }
        Ok(changed)
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn find_by_session(&self, session_id: &str) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .orders
            .iter()
            .find(|o| o.stripe_session_id == session_id)
            .cloned())
    }

    async fn insert(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        self.check_writable().await?;
        let mut tables = self.tables.write().await;

        if tables
            .orders
            .iter()
            .any(|o| o.stripe_session_id == order.stripe_session_id)
        {
            return Err(RepositoryError::Conflict(
                "order for this session already exists".to_string(),
            ));
        }

        let id = OrderId::new(tables.next_id());
        let saved = Order {
            id,
            user_id: order.user_id,
            products: order.products,
            total_amount: order.total_amount,
            currency: order.currency,
            stripe_session_id: order.stripe_session_id,
            created_at: Utc::now(),
        };
        tables.orders.push(saved.clone());
        Ok(saved)
    }

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .tables
            .read()
            .await
            .orders
            .iter()
            .filter(|o| o.user_id == user)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }
}

fn limit_to_usize(limit: u32) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

fn count_of(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}

#[async_trait]
impl AnalyticsStore for InMemoryStore {
    async fn count_users(&self) -> Result<i64, RepositoryError> {
        Ok(count_of(self.tables.read().await.users.len()))
    }

    async fn recent_users(&self, limit: u32) -> Result<Vec<UserSummary>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut users: Vec<(UserId, &MemoryUser)> =
            tables.users.iter().map(|(id, u)| (*id, u)).collect();
        users.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at).then(b.0.cmp(&a.0)));
        Ok(users
            .into_iter()
            .take(limit_to_usize(limit))
            .map(|(_, u)| UserSummary {
                name: u.name.clone(),
                email: u.email.clone(),
                created_at: u.created_at,
            })
            .collect())
    }

    async fn count_products(&self) -> Result<i64, RepositoryError> {
        Ok(count_of(self.tables.read().await.products.len()))
    }

    async fn featured_products(&self) -> Result<Vec<ProductSummary>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .products
            .values()
            .filter(|p| p.is_featured)
            .map(product_summary)
            .collect())
    }

    async fn recent_products(&self, limit: u32) -> Result<Vec<ProductSummary>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut products: Vec<&Product> = tables.products.values().collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(products
            .into_iter()
            .take(limit_to_usize(limit))
            .map(product_summary)
            .collect())
    }

    async fn products_by_category(&self) -> Result<Vec<CategoryCount>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        for product in tables.products.values() {
            *counts.entry(product.category.as_str()).or_default() += 1;
        }
        let mut rows: Vec<CategoryCount> = counts
            .into_iter()
            .map(|(category, count)| CategoryCount {
                category: category.to_string(),
                count,
            })
            .collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
        Ok(rows)
    }

    async fn count_orders(&self, since: Option<DateTime<Utc>>) -> Result<i64, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(count_of(
            tables
                .orders
                .iter()
                .filter(|o| since.is_none_or(|start| o.created_at >= start))
                .count(),
        ))
    }

    async fn recent_orders(&self, limit: u32) -> Result<Vec<OrderSummary>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut orders: Vec<&Order> = tables.orders.iter().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders
            .into_iter()
            .take(limit_to_usize(limit))
            .map(|o| OrderSummary {
                total_amount: o.total_amount,
                customer_name: tables.users.get(&o.user_id).map(|u| u.name.clone()),
                created_at: o.created_at,
            })
            .collect())
    }

    async fn revenue(&self, since: Option<DateTime<Utc>>) -> Result<Decimal, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .iter()
            .filter(|o| since.is_none_or(|start| o.created_at >= start))
            .map(|o| o.total_amount)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use shonifity_core::{CurrencyCode, OrderLine};

    use super::*;

    fn new_product(name: &str, price: i64, category: &str, featured: bool) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: format!("{name} description"),
            price: Decimal::from(price),
            category: category.to_string(),
            image: format!("https://img.example/{name}.png"),
            is_featured: featured,
        }
    }

    fn new_order(user: UserId, session: &str, total: i64) -> NewOrder {
        NewOrder {
            user_id: user,
            products: vec![OrderLine {
                product: ProductId::new(1),
                quantity: 1,
                price: Decimal::from(total),
            }],
            total_amount: Decimal::from(total),
            currency: CurrencyCode::USD,
            stripe_session_id: session.to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_updates_by_name() {
        let store = InMemoryStore::new();
        let first = store.upsert(new_product("Jeans", 50, "jeans", false)).await;
        let second = store.upsert(new_product("Jeans", 65, "jeans", true)).await;

        let (Ok(first), Ok(second)) = (first, second) else {
            panic!("upsert failed");
        };
        assert_eq!(first.id, second.id);
        assert_eq!(second.price, Decimal::from(65));
        assert_eq!(store.count_products().await.ok(), Some(1));
    }

    #[tokio::test]
    async fn test_duplicate_session_insert_conflicts() {
        let store = InMemoryStore::new();
        let user = store.add_user("Ann", "ann@example.com", UserRole::Customer).await;

        assert!(store.insert(new_order(user, "cs_1", 10)).await.is_ok());
        let dup = store.insert(new_order(user, "cs_1", 10)).await;

        assert!(matches!(dup, Err(RepositoryError::Conflict(_))));
        assert_eq!(store.orders().await.len(), 1);
    }

    #[tokio::test]
    async fn test_replace_for_user_keeps_one_coupon() {
        let store = InMemoryStore::new();
        let user = store.add_user("Ann", "ann@example.com", UserRole::Customer).await;
        let expires = Utc::now() + chrono::Duration::days(30);

        for code in ["GIFTAAAAAA", "GIFTBBBBBB"] {
            let issued = store
                .replace_for_user(NewCoupon {
                    code: code.to_string(),
                    discount_percentage: 10,
                    user_id: user,
                    expiration_date: expires,
                })
                .await;
            assert!(issued.is_ok());
        }

        let coupons = store.coupons_for(user).await;
        assert_eq!(coupons.len(), 1);
        assert_eq!(coupons.first().map(|c| c.code.as_str()), Some("GIFTBBBBBB"));
    }

    #[tokio::test]
    async fn test_cart_load_unknown_user_is_not_found() {
        let store = InMemoryStore::new();
        let result = store.load(UserId::new(404)).await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_new_user_has_empty_cart_and_role() {
        let store = InMemoryStore::new();
        let admin = store.add_user("Root", "root@example.com", UserRole::Admin).await;

        assert_eq!(store.role_of(admin).await, Some(UserRole::Admin));
        assert_eq!(store.role_of(UserId::new(404)).await, None);
        assert!(store.load(admin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_analytics_counts_and_revenue() {
        let store = InMemoryStore::new();
        let user = store.add_user("Ann", "ann@example.com", UserRole::Customer).await;
        let _ = store.upsert(new_product("Tee", 20, "t-shirts", true)).await;
        let _ = store.upsert(new_product("Jeans", 50, "jeans", false)).await;
        let _ = store.upsert(new_product("Polo", 30, "t-shirts", false)).await;
        let _ = store.insert(new_order(user, "cs_1", 40)).await;
        let _ = store.insert(new_order(user, "cs_2", 60)).await;

        assert_eq!(store.count_users().await.ok(), Some(1));
        assert_eq!(store.count_orders(None).await.ok(), Some(2));
        assert_eq!(store.revenue(None).await.ok(), Some(Decimal::from(100)));
        assert_eq!(
            store.count_orders(Some(Utc::now() + chrono::Duration::hours(1))).await.ok(),
            Some(0)
        );

        let categories = store.products_by_category().await.unwrap_or_default();
        assert_eq!(
            categories.first(),
            Some(&CategoryCount {
                category: "t-shirts".to_string(),
                count: 2
            })
        );

        let recent = store.recent_orders(5).await.unwrap_or_default();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent.first().and_then(|o| o.customer_name.clone()), Some("Ann".to_string()));
    }

    #[tokio::test]
    async fn test_fail_writes_surfaces_database_error() {
        let store = InMemoryStore::new();
        let user = store.add_user("Ann", "ann@example.com", UserRole::Customer).await;
        store.set_fail_writes(true).await;

        let result = store.save(user, &Cart::default()).await;
        assert!(matches!(result, Err(RepositoryError::Database(_))));
    }
}
