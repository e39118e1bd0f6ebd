//! Business logic services for the storefront.
//!
//! - `catalog` - Product reads with a cached featured list
//! - `cart` - Per-user cart ledger with serialized mutations
//! - `coupons` - Gift coupon issuance and redemption
//! - `checkout` - Payment session creation and order confirmation
//! - `chatbot` - Keyword-routed assistant over live data and a knowledge base

pub mod cart;
pub mod catalog;
pub mod chatbot;
pub mod checkout;
pub mod coupons;

pub use cart::{CartError, CartService, PricedCartItem};
pub use catalog::CatalogService;
pub use chatbot::{ChatReply, Chatbot, ChatbotConfig, ChatbotError};
pub use checkout::{CheckoutError, CheckoutRequest, CheckoutService, Confirmation, CreatedSession};
pub use coupons::{CouponError, CouponPolicy, CouponService};
