//! Discount coupons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{CouponId, UserId};

/// Prefix of every generated gift coupon code.
pub const COUPON_CODE_PREFIX: &str = "GIFT";

/// A percent-off coupon issued to a single user.
///
/// A user holds at most one active coupon at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub discount_percentage: u8,
    pub user_id: UserId,
    pub is_active: bool,
    pub expiration_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    /// Whether the expiration date has passed at `now`.
    ///
    /// Validation does not consult this; it exists so callers can report it.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date <= now
    }

    /// Whether this coupon can be applied by `user`.
    #[must_use]
    pub fn applies_to(&self, code: &str, user: UserId) -> bool {
        self.is_active && self.user_id == user && self.code == code
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn coupon(active: bool, expires_in_days: i64) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: CouponId::new(1),
            code: "GIFTAB12CD".to_string(),
            discount_percentage: 10,
            user_id: UserId::new(9),
            is_active: active,
            expiration_date: now + Duration::days(expires_in_days),
            created_at: now,
        }
    }

    #[test]
    fn test_applies_to_requires_code_user_and_active() {
        let c = coupon(true, 30);
        assert!(c.applies_to("GIFTAB12CD", UserId::new(9)));
        assert!(!c.applies_to("GIFTAB12CD", UserId::new(10)));
        assert!(!c.applies_to("GIFTZZZZZZ", UserId::new(9)));
        assert!(!coupon(false, 30).applies_to("GIFTAB12CD", UserId::new(9)));
    }

    #[test]
    fn test_expiry_is_reported_not_enforced() {
        let expired = coupon(true, -1);
        assert!(expired.is_expired(Utc::now()));
        assert!(expired.applies_to("GIFTAB12CD", UserId::new(9)));
    }
}
