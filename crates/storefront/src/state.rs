//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::db::{
    AnalyticsStore, CartStore, CouponStore, InMemoryStore, OrderStore, PgAnalyticsRepository,
    PgCartRepository, PgCouponRepository, PgOrderRepository, PgProductRepository, ProductStore,
};
use crate::payments::PaymentProvider;
use crate::services::{
    CartService, CatalogService, Chatbot, ChatbotConfig, ChatbotError, CheckoutService,
    CouponPolicy, CouponService,
};

/// Storage and payment backends the services are built on.
#[derive(Clone)]
pub struct Backends {
    pub products: Arc<dyn ProductStore>,
    pub carts: Arc<dyn CartStore>,
    pub coupons: Arc<dyn CouponStore>,
    pub orders: Arc<dyn OrderStore>,
    pub analytics: Arc<dyn AnalyticsStore>,
    pub payments: Arc<dyn PaymentProvider>,
    /// Present only for `PostgreSQL` backends; used by the readiness check.
    pub pool: Option<PgPool>,
}

impl Backends {
    /// `PostgreSQL` repositories over one pool.
    #[must_use]
    pub fn postgres(pool: PgPool, payments: Arc<dyn PaymentProvider>) -> Self {
        Self {
            products: Arc::new(PgProductRepository::new(pool.clone())),
            carts: Arc::new(PgCartRepository::new(pool.clone())),
            coupons: Arc::new(PgCouponRepository::new(pool.clone())),
            orders: Arc::new(PgOrderRepository::new(pool.clone())),
            analytics: Arc::new(PgAnalyticsRepository::new(pool.clone())),
            payments,
            pool: Some(pool),
        }
    }

    /// Every store backed by one in-memory store.
    #[must_use]
    pub fn in_memory(store: Arc<InMemoryStore>, payments: Arc<dyn PaymentProvider>) -> Self {
        Self {
            products: store.clone(),
            carts: store.clone(),
            coupons: store.clone(),
            orders: store.clone(),
            analytics: store,
            payments,
            pool: None,
        }
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// configuration and the services.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: Option<PgPool>,
    orders: Arc<dyn OrderStore>,
    catalog: CatalogService,
    cart: CartService,
    coupons: CouponService,
    checkout: CheckoutService,
    chatbot: Chatbot,
}

impl AppState {
    /// Wire the services over the given backends.
    ///
    /// # Errors
    ///
    /// Returns an error if the chatbot cannot be built.
    pub fn new(
        config: StorefrontConfig,
        backends: Backends,
        chatbot: ChatbotConfig,
    ) -> Result<Self, ChatbotError> {
        let catalog = CatalogService::new(backends.products.clone());
        let cart = CartService::new(backends.carts, backends.products.clone());
        let coupons = CouponService::new(backends.coupons, CouponPolicy::from(&config.checkout));
        let checkout = CheckoutService::new(
            backends.products,
            backends.orders.clone(),
            coupons.clone(),
            backends.payments,
            &config.client_url,
            &config.checkout,
        );
        let chatbot = Chatbot::new(chatbot, backends.analytics)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool: backends.pool,
                orders: backends.orders,
                catalog,
                cart,
                coupons,
                checkout,
                chatbot,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// The database pool, if running on `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// The order ledger, read directly for order history.
    #[must_use]
    pub fn orders(&self) -> &dyn OrderStore {
        self.inner.orders.as_ref()
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }

    #[must_use]
    pub fn coupons(&self) -> &CouponService {
        &self.inner.coupons
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }

    #[must_use]
    pub fn chatbot(&self) -> &Chatbot {
        &self.inner.chatbot
    }
}
