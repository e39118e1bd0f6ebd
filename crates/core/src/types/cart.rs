//! Cart ledger entries and mutation rules.
//!
//! A cart is an ordered list of `(product, quantity)` pairs owned by a user.
//! Storage may hold entries that are no longer valid (missing product
//! reference, non-positive quantity); those are kept as [`StoredCartItem`]
//! and never reach pricing.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// Largest quantity a single cart entry may hold.
pub const MAX_QUANTITY: i64 = u32::MAX as i64;

/// A cart entry exactly as persisted.
///
/// Decoding never fails: an element that is not a readable entry (`null`,
/// a mistyped product or a fractional quantity) becomes an invalid entry
/// that pricing skips and cleanup strips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawCartItem")]
pub struct StoredCartItem {
    pub product: Option<ProductId>,
    pub quantity: i64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCartItem {
    Entry {
        #[serde(default)]
        product: Option<ProductId>,
        #[serde(default)]
        quantity: i64,
    },
    Unreadable(serde::de::IgnoredAny),
}

impl From<RawCartItem> for StoredCartItem {
    fn from(raw: RawCartItem) -> Self {
        match raw {
            RawCartItem::Entry { product, quantity } => Self { product, quantity },
            RawCartItem::Unreadable(_) => Self {
                product: None,
                quantity: 0,
            },
        }
    }
}

impl StoredCartItem {
    /// A fresh valid entry.
    #[must_use]
    pub fn new(product: ProductId, quantity: u32) -> Self {
        Self {
            product: Some(product),
            quantity: i64::from(quantity),
        }
    }

    /// An entry is valid when it references a product and has a quantity in
    /// `1..=MAX_QUANTITY`.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.product.is_some() && self.quantity > 0 && self.quantity <= MAX_QUANTITY
    }

    /// The validated view of this entry, if it is valid.
    #[must_use]
    pub fn as_valid(&self) -> Option<CartItem> {
        let product = self.product?;
        let quantity = u32::try_from(self.quantity).ok().filter(|q| *q > 0)?;
        Some(CartItem { product, quantity })
    }

    fn is_for(&self, product: ProductId) -> bool {
        self.product == Some(product)
    }
}

/// A validated cart entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product: ProductId,
    pub quantity: u32,
}

/// Errors from cart mutations that the caller must surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartMutationError {
    #[error("quantity must be non-negative (got {0})")]
    NegativeQuantity(i64),
    #[error("quantity {0} exceeds the maximum of {MAX_QUANTITY}")]
    QuantityTooLarge(i64),
    #[error("product {0} is not in the cart")]
    NotInCart(ProductId),
}

/// A user's full cart.
///
/// Mutations operate on the whole list; callers persist the result as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart(Vec<StoredCartItem>);

impl Cart {
    #[must_use]
    pub const fn new(items: Vec<StoredCartItem>) -> Self {
        Self(items)
    }

    #[must_use]
    pub fn items(&self) -> &[StoredCartItem] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Increment the entry for `product`, or append it with quantity 1.
    pub fn add(&mut self, product: ProductId) {
        match self
            .0
            .iter_mut()
            .find(|item| item.is_valid() && item.is_for(product))
        {
            Some(item) => item.quantity = item.quantity.saturating_add(1).min(MAX_QUANTITY),
            None => self.0.push(StoredCartItem::new(product, 1)),
        }
    }

    /// Remove every entry for `product`. Invalid entries are dropped as well.
    pub fn remove(&mut self, product: ProductId) {
        self.0.retain(|item| item.is_valid() && !item.is_for(product));
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Replace the quantity for a product already in the cart.
    ///
    /// A quantity of zero removes the product, exactly like [`Cart::remove`].
    ///
    /// # Errors
    ///
    /// Returns `NegativeQuantity` for negative input, `QuantityTooLarge` above
    /// [`MAX_QUANTITY`] and `NotInCart` when the product has no valid entry.
    pub fn set_quantity(&mut self, product: ProductId, quantity: i64) -> Result<(), CartMutationError> {
        if quantity < 0 {
            return Err(CartMutationError::NegativeQuantity(quantity));
        }
        if quantity > MAX_QUANTITY {
            return Err(CartMutationError::QuantityTooLarge(quantity));
        }

        let Some(position) = self
            .0
            .iter()
            .position(|item| item.is_valid() && item.is_for(product))
        else {
            return Err(CartMutationError::NotInCart(product));
        };

        if quantity == 0 {
            self.remove(product);
        } else if let Some(item) = self.0.get_mut(position) {
            item.quantity = quantity;
        }
        Ok(())
    }

    /// Valid entries in cart order.
    pub fn valid_items(&self) -> impl Iterator<Item = CartItem> + '_ {
        self.0.iter().filter_map(StoredCartItem::as_valid)
    }

    /// Distinct product IDs referenced by valid entries, in cart order.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = Vec::new();
        for item in self.valid_items() {
            if !ids.contains(&item.product) {
                ids.push(item.product);
            }
        }
        ids
    }

    /// Drop invalid entries. Returns `true` if anything was removed.
    pub fn strip_invalid(&mut self) -> bool {
        let before = self.0.len();
        self.0.retain(StoredCartItem::is_valid);
        self.0.len() != before
    }
}

/// Subtotal and total of a priced cart, in USD major units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub total: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_percentage: Option<u8>,
}

impl CartTotals {
    /// Sum `price * quantity` and apply an optional percent-off discount.
    ///
    /// Both figures are rounded to cents; the total never drops below zero.
    pub fn compute<I>(lines: I, discount_percentage: Option<u8>) -> Self
    where
        I: IntoIterator<Item = (Decimal, u32)>,
    {
        let subtotal: Decimal = lines
            .into_iter()
            .map(|(price, quantity)| price * Decimal::from(quantity))
            .sum();

        let total = discount_percentage.map_or(subtotal, |percent| {
            let discount = subtotal * Decimal::from(percent) / Decimal::ONE_HUNDRED;
            (subtotal - discount).max(Decimal::ZERO)
        });

        Self {
            subtotal: round_cents(subtotal),
            total: round_cents(total),
            discount_percentage,
        }
    }
}

fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const A: ProductId = ProductId::new(1);
    const B: ProductId = ProductId::new(2);
    const C: ProductId = ProductId::new(3);

    fn cart_of(entries: &[(ProductId, u32)]) -> Cart {
        Cart::new(
            entries
                .iter()
                .map(|(p, q)| StoredCartItem::new(*p, *q))
                .collect(),
        )
    }

    #[test]
    fn test_add_same_product_twice_merges() {
        let mut cart = Cart::default();
        cart.add(A);
        cart.add(A);

        assert_eq!(cart.items(), &[StoredCartItem::new(A, 2)]);
    }

    #[test]
    fn test_add_appends_in_order() {
        let mut cart = Cart::default();
        cart.add(B);
        cart.add(A);
        cart.add(B);

        assert_eq!(cart.items(), &[StoredCartItem::new(B, 2), StoredCartItem::new(A, 1)]);
    }

    #[test]
    fn test_set_quantity_zero_matches_remove() {
        let original = cart_of(&[(A, 2), (B, 1), (C, 4)]);

        let mut via_update = original.clone();
        via_update.set_quantity(B, 0).unwrap_or_default();

        let mut via_remove = original;
        via_remove.remove(B);

        assert_eq!(via_update, via_remove);
        assert_eq!(via_update.product_ids(), vec![A, C]);
    }

    #[test]
    fn test_set_quantity_replaces() {
        let mut cart = cart_of(&[(A, 2)]);
        assert_eq!(cart.set_quantity(A, 5), Ok(()));
        assert_eq!(cart.items(), &[StoredCartItem::new(A, 5)]);
    }

    #[test]
    fn test_set_quantity_rejects_negative_and_missing() {
        let mut cart = cart_of(&[(A, 2)]);
        assert_eq!(
            cart.set_quantity(A, -1),
            Err(CartMutationError::NegativeQuantity(-1))
        );
        assert_eq!(cart.set_quantity(B, 3), Err(CartMutationError::NotInCart(B)));
        assert_eq!(cart.items(), &[StoredCartItem::new(A, 2)]);
    }

    #[test]
    fn test_remove_drops_invalid_entries() {
        let mut cart = Cart::new(vec![
            StoredCartItem::new(A, 1),
            StoredCartItem { product: None, quantity: 3 },
            StoredCartItem::new(B, 1),
        ]);
        cart.remove(A);
        assert_eq!(cart.items(), &[StoredCartItem::new(B, 1)]);
    }

    #[test]
    fn test_clear_empties_cart() {
        let mut cart = cart_of(&[(A, 1), (B, 1), (C, 1)]);
        cart.clear();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_valid_items_skip_invalid() {
        let cart = Cart::new(vec![
            StoredCartItem { product: None, quantity: 1 },
            StoredCartItem { product: Some(A), quantity: 0 },
            StoredCartItem { product: Some(B), quantity: -2 },
            StoredCartItem::new(C, 2),
        ]);

        let valid: Vec<CartItem> = cart.valid_items().collect();
        assert_eq!(valid, vec![CartItem { product: C, quantity: 2 }]);
    }

    #[test]
    fn test_strip_invalid_reports_change() {
        let mut clean = cart_of(&[(A, 1)]);
        assert!(!clean.strip_invalid());

        let mut dirty = Cart::new(vec![
            StoredCartItem::new(A, 1),
            StoredCartItem { product: None, quantity: 0 },
        ]);
        assert!(dirty.strip_invalid());
        assert_eq!(dirty.len(), 1);
    }

    #[test]
    fn test_stored_item_tolerates_missing_fields() {
        let parsed: Vec<StoredCartItem> =
            serde_json::from_str(r#"[{"quantity": 2}, {"product": 4}, {"product": 1, "quantity": 3}]"#)
                .unwrap_or_default();

        assert_eq!(parsed.len(), 3);
        assert!(!parsed[0].is_valid());
        assert!(!parsed[1].is_valid());
        assert!(parsed[2].is_valid());
    }

    #[test]
    fn test_set_quantity_rejects_values_pricing_cannot_hold() {
        let mut cart = cart_of(&[(A, 2)]);
        let too_large = MAX_QUANTITY + 1;

        assert_eq!(
            cart.set_quantity(A, too_large),
            Err(CartMutationError::QuantityTooLarge(too_large))
        );
        assert_eq!(cart.set_quantity(A, MAX_QUANTITY), Ok(()));
        assert_eq!(cart.valid_items().count(), 1);
    }

    #[test]
    fn test_oversized_stored_quantity_is_invalid() {
        let mut cart = Cart::new(vec![
            StoredCartItem { product: Some(A), quantity: MAX_QUANTITY + 1 },
            StoredCartItem::new(B, 1),
        ]);

        assert!(!cart.items()[0].is_valid());
        assert!(cart.strip_invalid());
        assert_eq!(cart.items(), &[StoredCartItem::new(B, 1)]);
    }

    #[test]
    fn test_add_stops_at_max_quantity() {
        let mut cart = Cart::new(vec![StoredCartItem { product: Some(A), quantity: MAX_QUANTITY }]);
        cart.add(A);
        assert_eq!(cart.valid_items().next().map(|i| i.quantity), Some(u32::MAX));
    }

    #[test]
    fn test_unreadable_elements_decode_as_invalid_entries() {
        let raw = r#"[
            {"product": 1, "quantity": 2},
            null,
            {"product": "abc", "quantity": 1},
            {"product": 3, "quantity": 1.5},
            7
        ]"#;
        let mut cart: Cart = serde_json::from_str(raw).unwrap();

        assert_eq!(cart.len(), 5);
        let valid: Vec<CartItem> = cart.valid_items().collect();
        assert_eq!(valid, vec![CartItem { product: A, quantity: 2 }]);

        assert!(cart.strip_invalid());
        assert_eq!(cart.items(), &[StoredCartItem::new(A, 2)]);
    }

    #[test]
    fn test_totals_without_coupon() {
        let totals = CartTotals::compute(
            [(Decimal::from(50), 2), (Decimal::from(30), 1)],
            None,
        );
        assert_eq!(totals.subtotal, Decimal::new(13000, 2));
        assert_eq!(totals.total, Decimal::new(13000, 2));
    }

    #[test]
    fn test_totals_with_ten_percent_coupon() {
        let totals = CartTotals::compute(
            [(Decimal::from(50), 2), (Decimal::from(30), 1)],
            Some(10),
        );
        assert_eq!(totals.subtotal, Decimal::new(13000, 2));
        assert_eq!(totals.total, Decimal::new(11700, 2));
    }

    #[test]
    fn test_totals_empty_cart() {
        let totals = CartTotals::compute(Vec::new(), Some(10));
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }
}
