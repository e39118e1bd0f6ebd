//! Checkout orchestration: price, open a provider session, confirm, record.
//!
//! # Flow
//!
//! 1. **Priced** - every requested line is repriced from the catalog; a
//!    client-sent price is only compared and logged.
//! 2. **Session created** - the provider gets USD line items, an optional
//!    one-off percent coupon and the metadata needed to rebuild the order.
//!    A pre-discount total at or above the threshold earns a gift coupon.
//! 3. **Confirmed** - the provider reports the session as paid.
//! 4. **Reconciled** - the coupon is redeemed and exactly one order exists
//!    for the session, even when confirmations race.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use shonifity_core::{
    CurrencyCode, MinorUnits, Order, OrderLine, PaymentStatus, Product, ProductId, UnknownCurrency,
    UserId,
};

use super::coupons::{CouponError, CouponService};
use crate::config::CheckoutConfig;
use crate::db::{NewOrder, OrderStore, ProductStore, RepositoryError};
use crate::payments::{CheckoutSessionRequest, LineItem, PaymentError, PaymentProvider};

/// Metadata keys written on the provider session.
pub mod metadata_keys {
    pub const USER_ID: &str = "userId";
    pub const COUPON_CODE: &str = "couponCode";
    pub const CURRENCY: &str = "currency";
    pub const PRODUCTS: &str = "products";
}

/// Errors from checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("products must be a non-empty array")]
    EmptyProducts,

    #[error("product {0} not found")]
    UnknownProduct(ProductId),

    #[error("quantity for product {0} must be at least 1")]
    InvalidQuantity(ProductId),

    #[error(transparent)]
    UnsupportedCurrency(#[from] UnknownCurrency),

    #[error("order total is too large")]
    AmountOverflow,

    /// The provider rejected session or coupon creation.
    #[error("failed to create checkout session: {0}")]
    SessionCreation(PaymentError),

    #[error("session ID is required")]
    MissingSessionId,

    /// The provider could not return the session.
    #[error("failed to retrieve checkout session: {0}")]
    SessionRetrieval(PaymentError),

    #[error("payment not completed (status: {status})")]
    PaymentNotCompleted {
        status: PaymentStatus,
        session_id: String,
    },

    /// The paid session cannot be turned into an order.
    #[error("invalid session metadata: {0}")]
    InvalidMetadata(String),

    /// Payment succeeded but the order could not be stored.
    #[error("failed to record order: {0}")]
    OrderPersistence(RepositoryError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Coupon(#[from] CouponError),
}

/// One requested checkout line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLine {
    #[serde(alias = "_id")]
    pub id: ProductId,
    #[serde(default)]
    pub quantity: Option<u32>,
    /// Price the client displayed; informational only.
    #[serde(default)]
    pub price: Option<Decimal>,
}

/// Input to [`CheckoutService::create_session`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckoutRequest {
    pub lines: Vec<CheckoutLine>,
    pub coupon_code: Option<String>,
    pub currency: Option<String>,
}

/// A freshly opened provider session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    pub id: String,
    pub url: Option<String>,
    /// Amount after the coupon discount.
    pub total_amount: MinorUnits,
    pub gift_coupon_issued: bool,
}

/// Result of confirming a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub order: Order,
    /// `true` when the order was recorded by an earlier confirmation.
    pub is_existing: bool,
}

/// Order line as carried in session metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct MetadataLine {
    id: ProductId,
    quantity: u32,
    price: Decimal,
}

/// Checkout service.
#[derive(Clone)]
pub struct CheckoutService {
    products: Arc<dyn ProductStore>,
    orders: Arc<dyn OrderStore>,
    coupons: CouponService,
    payments: Arc<dyn PaymentProvider>,
    client_url: String,
    coupon_threshold: MinorUnits,
}

struct PricedLine {
    product: Product,
    quantity: u32,
    unit_amount: MinorUnits,
}

impl CheckoutService {
    #[must_use]
    pub fn new(
        products: Arc<dyn ProductStore>,
        orders: Arc<dyn OrderStore>,
        coupons: CouponService,
        payments: Arc<dyn PaymentProvider>,
        client_url: &str,
        config: &CheckoutConfig,
    ) -> Self {
        Self {
            products,
            orders,
            coupons,
            payments,
            client_url: client_url.trim_end_matches('/').to_string(),
            coupon_threshold: config.coupon_threshold,
        }
    }

    async fn price_lines(&self, lines: &[CheckoutLine]) -> Result<Vec<PricedLine>, CheckoutError> {
        let ids: Vec<ProductId> = lines.iter().map(|l| l.id).collect();
        let catalog: HashMap<ProductId, Product> = self
            .products
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        lines
            .iter()
            .map(|line| {
                let product = catalog
                    .get(&line.id)
                    .cloned()
                    .ok_or(CheckoutError::UnknownProduct(line.id))?;
                let quantity = line.quantity.unwrap_or(1);
                if quantity == 0 {
                    return Err(CheckoutError::InvalidQuantity(line.id));
                }
                if let Some(sent) = line.price
                    && sent != product.price
                {
                    debug!(
                        product_id = %line.id,
                        client_price = %sent,
                        catalog_price = %product.price,
                        "Client price differs from catalog, using catalog"
                    );
                }
                let unit_amount =
                    MinorUnits::from_major(product.price).ok_or(CheckoutError::AmountOverflow)?;
                Ok(PricedLine {
                    product,
                    quantity,
                    unit_amount,
                })
            })
            .collect()
    }

    /// Price the request and open a hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty input, unknown products, zero
    /// quantities or an unsupported currency, and `SessionCreation` when the
    /// provider rejects the session.
    #[instrument(skip(self, request), fields(user_id = %user, lines = request.lines.len()))]
    pub async fn create_session(
        &self,
        user: UserId,
        request: CheckoutRequest,
    ) -> Result<CreatedSession, CheckoutError> {
        if request.lines.is_empty() {
            return Err(CheckoutError::EmptyProducts);
        }
        let currency = match request.currency.as_deref() {
            Some(code) if !code.trim().is_empty() => code.parse::<CurrencyCode>()?,
            _ => CurrencyCode::USD,
        };

        let priced = self.price_lines(&request.lines).await?;

        let gross = priced.iter().try_fold(MinorUnits::ZERO, |acc, line| {
            line.unit_amount
                .checked_mul(line.quantity)
                .and_then(|amount| acc.checked_add(amount))
        });
        let gross = gross.ok_or(CheckoutError::AmountOverflow)?;

        let coupon = match request.coupon_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => self.coupons.validate(code, user).await?,
            _ => None,
        };

        let mut total = gross;
        let mut discount_coupon = None;
        if let Some(coupon) = &coupon {
            total = gross.saturating_sub(gross.percentage(coupon.discount_percentage));
            let provider_coupon = self
                .payments
                .create_percent_coupon(coupon.discount_percentage)
                .await
                .map_err(CheckoutError::SessionCreation)?;
            discount_coupon = Some(provider_coupon);
        }

        let metadata_lines: Vec<MetadataLine> = priced
            .iter()
            .map(|line| MetadataLine {
                id: line.product.id,
                quantity: line.quantity,
                price: line.product.price,
            })
            .collect();
        let products_json = serde_json::to_string(&metadata_lines)
            .map_err(|e| CheckoutError::InvalidMetadata(e.to_string()))?;

        let metadata = BTreeMap::from([
            (metadata_keys::USER_ID.to_string(), user.to_string()),
            (
                metadata_keys::COUPON_CODE.to_string(),
                coupon.as_ref().map(|c| c.code.clone()).unwrap_or_default(),
            ),
            (metadata_keys::CURRENCY.to_string(), currency.code().to_string()),
            (metadata_keys::PRODUCTS.to_string(), products_json),
        ]);

        let session_request = CheckoutSessionRequest {
            line_items: priced
                .into_iter()
                .map(|line| LineItem {
                    image: Some(line.product.image).filter(|i| !i.is_empty()),
                    name: line.product.name,
                    unit_amount: line.unit_amount,
                    quantity: line.quantity,
                    currency: CurrencyCode::USD,
                })
                .collect(),
            success_url: format!(
                "{}/purchase-success?session_id={{CHECKOUT_SESSION_ID}}",
                self.client_url
            ),
            cancel_url: format!("{}/purchase-cancel", self.client_url),
            discount_coupon,
            metadata,
        };

        let session = self
            .payments
            .create_checkout_session(&session_request)
            .await
            .map_err(CheckoutError::SessionCreation)?;

        info!(session_id = %session.id, total = %total, "Checkout session created");

        let gift_coupon_issued = if gross >= self.coupon_threshold {
            match self.coupons.issue(user).await {
                Ok(_) => true,
                Err(e) => {
                    warn!(error = %e, "Failed to issue gift coupon");
                    false
                }
            }
        } else {
            false
        };

        Ok(CreatedSession {
            id: session.id,
            url: session.url,
            total_amount: total,
            gift_coupon_issued,
        })
    }

    /// Confirm a paid session and record its order exactly once.
    ///
    /// # Errors
    ///
    /// Returns `MissingSessionId`, `SessionRetrieval` or `PaymentNotCompleted`
    /// without changing state, and `InvalidMetadata` or `OrderPersistence`
    /// when payment succeeded but no order could be recorded.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn confirm(&self, session_id: &str) -> Result<Confirmation, CheckoutError> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(CheckoutError::MissingSessionId);
        }

        if let Some(order) = self.orders.find_by_session(session_id).await? {
            info!(order_id = %order.id, "Order already recorded for session");
            return Ok(Confirmation {
                order,
                is_existing: true,
            });
        }

        let session = self
            .payments
            .retrieve_checkout_session(session_id)
            .await
            .map_err(CheckoutError::SessionRetrieval)?;

        if !session.payment_status.is_paid() {
            return Err(CheckoutError::PaymentNotCompleted {
                status: session.payment_status,
                session_id: session_id.to_string(),
            });
        }

        let user = session
            .metadata
            .get(metadata_keys::USER_ID)
            .and_then(|raw| raw.parse::<i32>().ok())
            .map(UserId::new);

        if let (Some(user), Some(code)) = (
            user,
            session
                .metadata
                .get(metadata_keys::COUPON_CODE)
                .filter(|c| !c.is_empty()),
        ) {
            self.coupons.redeem(code, user).await;
        }

        let order = build_order(session_id, user, &session.metadata, session.amount_total)?;

        match self.orders.insert(order).await {
            Ok(order) => {
                info!(order_id = %order.id, "Order recorded");
                Ok(Confirmation {
                    order,
                    is_existing: false,
                })
            }
            Err(RepositoryError::Conflict(reason)) => {
                debug!(%reason, "Concurrent confirmation recorded the order first");
                match self.orders.find_by_session(session_id).await? {
                    Some(order) => Ok(Confirmation {
                        order,
                        is_existing: true,
                    }),
                    None => Err(CheckoutError::OrderPersistence(RepositoryError::Conflict(
                        reason,
                    ))),
                }
            }
            Err(e) => Err(CheckoutError::OrderPersistence(e)),
        }
    }
}

fn build_order(
    session_id: &str,
    user: Option<UserId>,
    metadata: &BTreeMap<String, String>,
    amount_total: Option<MinorUnits>,
) -> Result<NewOrder, CheckoutError> {
    let user_id =
        user.ok_or_else(|| CheckoutError::InvalidMetadata("missing or invalid userId".into()))?;

    let raw_products = metadata
        .get(metadata_keys::PRODUCTS)
        .ok_or_else(|| CheckoutError::InvalidMetadata("missing products".into()))?;
    let lines: Vec<MetadataLine> = serde_json::from_str(raw_products)
        .map_err(|e| CheckoutError::InvalidMetadata(format!("products: {e}")))?;

    let currency = match metadata.get(metadata_keys::CURRENCY) {
        Some(code) if !code.is_empty() => code
            .parse::<CurrencyCode>()
            .map_err(|e| CheckoutError::InvalidMetadata(e.to_string()))?,
        _ => CurrencyCode::USD,
    };

    let total = amount_total
        .ok_or_else(|| CheckoutError::InvalidMetadata("session has no amount_total".into()))?;

    Ok(NewOrder {
        user_id,
        products: lines
            .into_iter()
            .map(|line| OrderLine {
                product: line.id,
                quantity: line.quantity,
                price: line.price,
            })
            .collect(),
        total_amount: total.to_major(),
        currency,
        stripe_session_id: session_id.to_string(),
    })
}
