//! Money representation.
//!
//! Catalog prices are `Decimal` amounts in USD major units (dollars). The
//! payment provider works in minor units (cents), so every provider-facing
//! amount goes through [`MinorUnits`].

use core::fmt;
use core::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// An amount in the payment provider's smallest currency unit (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MinorUnits(i64);

impl MinorUnits {
    /// Zero cents.
    pub const ZERO: Self = Self(0);

    /// Create an amount from raw cents.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Raw cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Convert a major-unit amount to cents: `round(amount * 100)`.
    ///
    /// Midpoints round away from zero. Returns `None` if the result does not
    /// fit in an `i64`.
    #[must_use]
    pub fn from_major(amount: Decimal) -> Option<Self> {
        let scaled = amount.checked_mul(Decimal::ONE_HUNDRED)?;
        scaled
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .map(Self)
    }

    /// Convert back to a major-unit amount with two decimal places.
    #[must_use]
    pub fn to_major(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Multiply by a quantity, `None` on overflow.
    #[must_use]
    pub fn checked_mul(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(i64::from(quantity)).map(Self)
    }

    /// Add two amounts, `None` on overflow.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// `round(self * percent / 100)`, the discount taken by a percent-off coupon.
    #[must_use]
    pub fn percentage(self, percent: u8) -> Self {
        let portion = Decimal::from(self.0) * Decimal::from(percent) / Decimal::ONE_HUNDRED;
        portion
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .map_or(Self::ZERO, Self)
    }

    /// Subtract, flooring at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        let value = self.0.saturating_sub(other.0);
        if value < 0 { Self(0) } else { Self(value) }
    }
}

impl fmt::Display for MinorUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_major())
    }
}

/// ISO 4217 currency codes the storefront knows about.
///
/// Catalog prices and provider charges are always [`CurrencyCode::USD`]; the
/// other codes are display currencies chosen by the shopper and recorded on
/// the checkout session and order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
    INR,
}

/// Error returned when parsing an unsupported currency code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported currency: {0}")]
pub struct UnknownCurrency(pub String);

impl CurrencyCode {
    /// The ISO code as an upper-case string.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
            Self::INR => "INR",
        }
    }

    /// The lower-case code the payment provider expects.
    #[must_use]
    pub fn provider_code(self) -> String {
        self.code().to_ascii_lowercase()
    }

    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
            Self::INR => "₹",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CurrencyCode {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            "INR" => Ok(Self::INR),
            _ => Err(UnknownCurrency(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap_or_default()
    }

    #[test]
    fn test_from_major_rounds_to_cents() {
        assert_eq!(MinorUnits::from_major(dec("50")), Some(MinorUnits::new(5000)));
        assert_eq!(MinorUnits::from_major(dec("19.99")), Some(MinorUnits::new(1999)));
        assert_eq!(MinorUnits::from_major(dec("0.125")), Some(MinorUnits::new(13)));
        assert_eq!(MinorUnits::from_major(dec("10.004")), Some(MinorUnits::new(1000)));
    }

    #[test]
    fn test_to_major_keeps_two_places() {
        assert_eq!(MinorUnits::new(11700).to_major().to_string(), "117.00");
        assert_eq!(MinorUnits::new(5).to_major().to_string(), "0.05");
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        assert_eq!(MinorUnits::new(13000).percentage(10), MinorUnits::new(1300));
        assert_eq!(MinorUnits::new(1005).percentage(10), MinorUnits::new(101));
        assert_eq!(MinorUnits::new(1004).percentage(10), MinorUnits::new(100));
        assert_eq!(MinorUnits::new(999).percentage(0), MinorUnits::ZERO);
    }

    #[test]
    fn test_saturating_sub_floors_at_zero() {
        let total = MinorUnits::new(500);
        assert_eq!(total.saturating_sub(MinorUnits::new(200)), MinorUnits::new(300));
        assert_eq!(total.saturating_sub(MinorUnits::new(900)), MinorUnits::ZERO);
    }

    #[test]
    fn test_checked_arithmetic() {
        assert_eq!(MinorUnits::new(5000).checked_mul(2), Some(MinorUnits::new(10000)));
        assert_eq!(MinorUnits::new(i64::MAX).checked_mul(2), None);
        assert_eq!(MinorUnits::new(i64::MAX).checked_add(MinorUnits::new(1)), None);
    }

    #[test]
    fn test_currency_parse_is_case_insensitive() {
        assert_eq!("usd".parse::<CurrencyCode>(), Ok(CurrencyCode::USD));
        assert_eq!(" INR ".parse::<CurrencyCode>(), Ok(CurrencyCode::INR));
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn test_provider_code_is_lower_case() {
        assert_eq!(CurrencyCode::USD.provider_code(), "usd");
        assert_eq!(CurrencyCode::GBP.symbol(), "£");
    }
}
