//! In-process payment provider for tests.
//!
//! Sessions are kept in memory. A created session starts `unpaid`; tests flip
//! it with [`MockPaymentProvider::mark_paid`] before confirming.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use shonifity_core::{MinorUnits, PaymentStatus};

use super::{CheckoutSession, CheckoutSessionRequest, PaymentError, PaymentProvider};

#[derive(Default)]
struct MockState {
    sessions: HashMap<String, CheckoutSession>,
    requests: Vec<CheckoutSessionRequest>,
    coupons: HashMap<String, u8>,
    next_id: u32,
    fail_create: bool,
    fail_retrieve: bool,
}

/// Mock payment provider.
#[derive(Default)]
pub struct MockPaymentProvider {
    state: RwLock<MockState>,
}

impl MockPaymentProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make session creation fail with an API error.
    pub async fn set_fail_create(&self, fail: bool) {
        self.state.write().await.fail_create = fail;
    }

    /// Make session retrieval fail with an API error.
    pub async fn set_fail_retrieve(&self, fail: bool) {
        self.state.write().await.fail_retrieve = fail;
    }

    /// Mark a session as paid.
    pub async fn mark_paid(&self, id: &str) {
        self.set_payment_status(id, PaymentStatus::Paid).await;
    }

    pub async fn set_payment_status(&self, id: &str, status: PaymentStatus) {
        if let Some(session) = self.state.write().await.sessions.get_mut(id) {
            session.payment_status = status;
        }
    }

    /// Insert a session directly, bypassing creation.
    pub async fn insert_session(&self, session: CheckoutSession) {
        self.state
            .write()
            .await
            .sessions
            .insert(session.id.clone(), session);
    }

    /// Every creation request received, oldest first.
    pub async fn requests(&self) -> Vec<CheckoutSessionRequest> {
        self.state.read().await.requests.clone()
    }

    /// Number of provider coupons created.
    pub async fn coupon_count(&self) -> usize {
        self.state.read().await.coupons.len()
    }
}

fn charged_amount(request: &CheckoutSessionRequest, percent_off: Option<u8>) -> Option<MinorUnits> {
    let gross = request.line_items.iter().try_fold(MinorUnits::ZERO, |acc, item| {
        item.unit_amount
            .checked_mul(item.quantity)
            .and_then(|line| acc.checked_add(line))
    })?;
    Some(percent_off.map_or(gross, |pct| gross.saturating_sub(gross.percentage(pct))))
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let mut state = self.state.write().await;
        if state.fail_create {
            return Err(PaymentError::Api {
                status: 500,
                message: "mock create failure".to_string(),
            });
        }

        state.next_id += 1;
        let id = format!("cs_test_{}", state.next_id);
        let percent_off = request
            .discount_coupon
            .as_ref()
            .and_then(|coupon| state.coupons.get(coupon).copied());

        let session = CheckoutSession {
            id: id.clone(),
            payment_status: PaymentStatus::Unpaid,
            amount_total: charged_amount(request, percent_off),
            metadata: request.metadata.clone(),
            url: Some(format!("https://checkout.example/pay/{id}")),
        };
        state.sessions.insert(id, session.clone());
        state.requests.push(request.clone());
        Ok(session)
    }

    async fn retrieve_checkout_session(&self, id: &str) -> Result<CheckoutSession, PaymentError> {
        let state = self.state.read().await;
        if state.fail_retrieve {
            return Err(PaymentError::Api {
                status: 500,
                message: "mock retrieve failure".to_string(),
            });
        }
        state
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| PaymentError::NotFound(format!("No such checkout.session: {id}")))
    }

    async fn create_percent_coupon(&self, percent_off: u8) -> Result<String, PaymentError> {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let id = format!("co_test_{}", state.next_id);
        state.coupons.insert(id.clone(), percent_off);
        Ok(id)
    }
}
