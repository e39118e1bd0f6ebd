//! Core types for Shonifity.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod coupon;
pub mod id;
pub mod order;
pub mod price;
pub mod product;
pub mod status;

pub use cart::{Cart, CartItem, CartMutationError, CartTotals, MAX_QUANTITY, StoredCartItem};
pub use coupon::{COUPON_CODE_PREFIX, Coupon};
pub use id::*;
pub use order::{Order, OrderLine};
pub use price::{CurrencyCode, MinorUnits, UnknownCurrency};
pub use product::Product;
pub use status::*;
