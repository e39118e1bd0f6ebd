//! Completed purchases.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{OrderId, ProductId, UserId};
use super::price::CurrencyCode;

/// One purchased product, priced at checkout time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product: ProductId,
    pub quantity: u32,
    pub price: Decimal,
}

/// An immutable record of a paid checkout session.
///
/// `stripe_session_id` is unique across all orders; it is the only guard
/// against recording the same payment twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(rename = "user")]
    pub user_id: UserId,
    pub products: Vec<OrderLine>,
    pub total_amount: Decimal,
    pub currency: CurrencyCode,
    pub stripe_session_id: String,
    pub created_at: DateTime<Utc>,
}
