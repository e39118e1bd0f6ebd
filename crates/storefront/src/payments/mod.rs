//! Hosted-checkout payment provider.
//!
//! Checkout never talks to Stripe directly; it goes through the
//! [`PaymentProvider`] trait so the orchestration can be exercised against
//! [`MockPaymentProvider`] in tests.
//!
//! All amounts crossing this boundary are [`MinorUnits`] (cents).

mod mock;
mod stripe;

pub use mock::MockPaymentProvider;
pub use stripe::StripeClient;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use shonifity_core::{CurrencyCode, MinorUnits, PaymentStatus};

/// Errors from the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the provider.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Checkout session or coupon not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Unauthorized (invalid secret key).
    #[error("Unauthorized: invalid API key")]
    Unauthorized,
}

/// One line of a hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub name: String,
    pub image: Option<String>,
    pub unit_amount: MinorUnits,
    pub quantity: u32,
    pub currency: CurrencyCode,
}

/// Everything needed to open a hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub line_items: Vec<LineItem>,
    pub success_url: String,
    pub cancel_url: String,
    /// Provider-side coupon ID to apply as a discount.
    pub discount_coupon: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

/// A checkout session as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub payment_status: PaymentStatus,
    /// Amount charged after discounts.
    pub amount_total: Option<MinorUnits>,
    pub metadata: BTreeMap<String, String>,
    /// Hosted page URL, present on freshly created sessions.
    pub url: Option<String>,
}

/// Payment provider operations used by checkout.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Open a hosted checkout session.
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Fetch a session by ID.
    async fn retrieve_checkout_session(&self, id: &str) -> Result<CheckoutSession, PaymentError>;

    /// Create a one-time percent-off coupon and return its provider ID.
    async fn create_percent_coupon(&self, percent_off: u8) -> Result<String, PaymentError>;
}
