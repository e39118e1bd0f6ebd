//! Gift coupon issuer.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::seq::IndexedRandom;
use thiserror::Error;
use tracing::{info, instrument, warn};

use shonifity_core::{COUPON_CODE_PREFIX, Coupon, UserId};

use crate::config::CheckoutConfig;
use crate::db::{CouponStore, NewCoupon, RepositoryError};

const CODE_CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const CODE_SUFFIX_LEN: usize = 6;
const MAX_CODE_ATTEMPTS: usize = 3;

/// Errors from coupon operations.
#[derive(Debug, Error)]
pub enum CouponError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Every generated code collided with an existing one.
    #[error("could not generate a unique coupon code")]
    CodeExhausted,
}

/// Discount and lifetime of issued coupons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CouponPolicy {
    pub discount_percentage: u8,
    pub valid_for: Duration,
}

impl From<&CheckoutConfig> for CouponPolicy {
    fn from(config: &CheckoutConfig) -> Self {
        Self {
            discount_percentage: config.coupon_discount_percent,
            valid_for: Duration::days(config.coupon_valid_days),
        }
    }
}

impl Default for CouponPolicy {
    fn default() -> Self {
        Self::from(&CheckoutConfig::default())
    }
}

/// `GIFT` followed by six random upper-case alphanumerics.
#[must_use]
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..CODE_SUFFIX_LEN)
        .filter_map(|_| CODE_CHARSET.choose(&mut rng).copied().map(char::from))
        .collect();
    format!("{COUPON_CODE_PREFIX}{suffix}")
}

/// Coupon service.
#[derive(Clone)]
pub struct CouponService {
    coupons: Arc<dyn CouponStore>,
    policy: CouponPolicy,
}

impl CouponService {
    #[must_use]
    pub fn new(coupons: Arc<dyn CouponStore>, policy: CouponPolicy) -> Self {
        Self { coupons, policy }
    }

    /// Issue a fresh coupon under the configured policy.
    ///
    /// Any coupon the user held before is deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the coupon cannot be stored.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn issue(&self, user: UserId) -> Result<Coupon, CouponError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let candidate = NewCoupon {
                code: generate_code(),
                discount_percentage: self.policy.discount_percentage,
                user_id: user,
                expiration_date: Utc::now() + self.policy.valid_for,
            };

            match self.coupons.replace_for_user(candidate).await {
                Ok(coupon) => {
                    info!(code = %coupon.code, "Issued gift coupon");
                    return Ok(coupon);
                }
                Err(RepositoryError::Conflict(_)) => {
                    warn!("Generated coupon code collided, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(CouponError::CodeExhausted)
    }

    /// The user's active coupon with this code.
    ///
    /// Expiration is not enforced; an expired coupon is reported in the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn validate(&self, code: &str, user: UserId) -> Result<Option<Coupon>, CouponError> {
        let coupon = self.coupons.find_active(code, user).await?;
        if let Some(c) = &coupon
            && c.is_expired(Utc::now())
        {
            warn!(code = %c.code, expired_at = %c.expiration_date, "Accepting expired coupon");
        }
        Ok(coupon)
    }

    /// Deactivate a coupon after a successful payment.
    ///
    /// Best-effort: a missing coupon or a storage failure is logged only.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn redeem(&self, code: &str, user: UserId) {
        match self.coupons.deactivate(code, user).await {
            Ok(true) => info!(code, "Coupon redeemed"),
            Ok(false) => warn!(code, "No active coupon to redeem"),
            Err(e) => warn!(code, error = %e, "Failed to deactivate coupon"),
        }
    }

    /// The user's active coupon, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub async fn active_for(&self, user: UserId) -> Result<Option<Coupon>, CouponError> {
        Ok(self.coupons.active_for_user(user).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shonifity_core::UserRole;

    use super::*;
    use crate::db::InMemoryStore;

    async fn service() -> (Arc<InMemoryStore>, CouponService, UserId) {
        let store = Arc::new(InMemoryStore::new());
        let user = store.add_user("Ann", "ann@example.com", UserRole::Customer).await;
        let service = CouponService::new(store.clone(), CouponPolicy::default());
        (store, service, user)
    }

    #[test]
    fn test_generated_code_shape() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), 10);
            let suffix = code.strip_prefix("GIFT").unwrap();
            assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        }
    }

    #[tokio::test]
    async fn test_issue_uses_policy() {
        let (_, service, user) = service().await;
        let coupon = service.issue(user).await.unwrap();

        assert!(coupon.is_active);
        assert_eq!(coupon.discount_percentage, 10);
        let days = (coupon.expiration_date - Utc::now()).num_days();
        assert!((29..=30).contains(&days));
    }

    #[tokio::test]
    async fn test_second_issue_leaves_one_active() {
        let (store, service, user) = service().await;
        let first = service.issue(user).await.unwrap();
        let second = service.issue(user).await.unwrap();

        let active: Vec<Coupon> = store
            .coupons_for(user)
            .await
            .into_iter()
            .filter(|c| c.is_active)
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active.first().map(|c| &c.code), Some(&second.code));
        assert!(service.validate(&first.code, user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_validate_requires_owner_and_active() {
        let (store, service, user) = service().await;
        let other = store.add_user("Bo", "bo@example.com", UserRole::Customer).await;
        let coupon = service.issue(user).await.unwrap();

        assert!(service.validate(&coupon.code, user).await.unwrap().is_some());
        assert!(service.validate(&coupon.code, other).await.unwrap().is_none());

        service.redeem(&coupon.code, user).await;
        assert!(service.validate(&coupon.code, user).await.unwrap().is_none());
        assert!(service.active_for(user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_validate_accepts_expired_coupon() {
        let (store, _, user) = service().await;
        let service = CouponService::new(
            store.clone(),
            CouponPolicy {
                discount_percentage: 10,
                valid_for: Duration::days(-1),
            },
        );
        let coupon = service.issue(user).await.unwrap();

        assert!(coupon.is_expired(Utc::now()));
        assert!(service.validate(&coupon.code, user).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_redeem_swallows_storage_failure() {
        let (store, service, user) = service().await;
        let coupon = service.issue(user).await.unwrap();
        store.set_fail_writes(true).await;

        service.redeem(&coupon.code, user).await;

        store.set_fail_writes(false).await;
        assert!(service.validate(&coupon.code, user).await.unwrap().is_some());
    }
}
