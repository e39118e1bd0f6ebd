//! Stripe REST client.
//!
//! - Base URL: `https://api.stripe.com/v1` (overridable for tests and proxies)
//! - Authentication: secret key via `Authorization: Bearer <key>`
//! - Requests are form-encoded with bracketed keys (`line_items[0][quantity]`)

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;

use shonifity_core::{MinorUnits, PaymentStatus};

use super::{CheckoutSession, CheckoutSessionRequest, PaymentError, PaymentProvider};
use crate::config::StripeConfig;

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    #[serde(default)]
    payment_status: PaymentStatus,
    amount_total: Option<i64>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
    url: Option<String>,
}

impl From<SessionResponse> for CheckoutSession {
    fn from(session: SessionResponse) -> Self {
        Self {
            id: session.id,
            payment_status: session.payment_status,
            amount_total: session.amount_total.map(MinorUnits::new),
            metadata: session.metadata,
            url: session.url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CouponResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|e| PaymentError::Parse(format!("Invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(StripeClientInner {
                client,
                api_base: config.api_base.trim_end_matches('/').to_string(),
            }),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, PaymentError> {
        let url = format!("{}{path}", self.inner.api_base);
        let response = self.inner.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<T, PaymentError> {
        let url = format!("{}{path}", self.inner.api_base);
        let response = self.inner.client.post(&url).form(params).send().await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        if response.status().is_success() {
            return response
                .json()
                .await
                .map_err(|e| PaymentError::Parse(format!("Failed to parse response: {e}")));
        }

        Err(self.parse_error(response).await)
    }

    async fn parse_error(&self, response: reqwest::Response) -> PaymentError {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(1);
            return PaymentError::RateLimited(retry_after);
        }

        if status == 401 || status == 403 {
            return PaymentError::Unauthorized;
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .and_then(|e| e.error.message)
            .unwrap_or_else(|| {
                if body.is_empty() {
                    "Unknown error".to_string()
                } else {
                    body
                }
            });

        if status == 404 {
            return PaymentError::NotFound(message);
        }

        PaymentError::Api { status, message }
    }
}

/// Flatten a session request into Stripe's bracketed form encoding.
fn session_params(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];

    for (i, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        params.push((
            format!("{prefix}[price_data][currency]"),
            item.currency.provider_code(),
        ));
        params.push((
            format!("{prefix}[price_data][product_data][name]"),
            item.name.clone(),
        ));
        if let Some(image) = &item.image {
            params.push((
                format!("{prefix}[price_data][product_data][images][0]"),
                image.clone(),
            ));
        }
        params.push((
            format!("{prefix}[price_data][unit_amount]"),
            item.unit_amount.cents().to_string(),
        ));
        params.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
    }

    if let Some(coupon) = &request.discount_coupon {
        params.push(("discounts[0][coupon]".to_string(), coupon.clone()));
    }

    for (key, value) in &request.metadata {
        params.push((format!("metadata[{key}]"), value.clone()));
    }

    params
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let session: SessionResponse = self
            .post_form("/checkout/sessions", &session_params(request))
            .await?;
        Ok(session.into())
    }

    async fn retrieve_checkout_session(&self, id: &str) -> Result<CheckoutSession, PaymentError> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(PaymentError::NotFound(format!("invalid session id: {id}")));
        }
        let session: SessionResponse = self.get(&format!("/checkout/sessions/{id}")).await?;
        Ok(session.into())
    }

    async fn create_percent_coupon(&self, percent_off: u8) -> Result<String, PaymentError> {
        let params = [
            ("percent_off".to_string(), percent_off.to_string()),
            ("duration".to_string(), "once".to_string()),
        ];
        let coupon: CouponResponse = self.post_form("/coupons", &params).await?;
        Ok(coupon.id)
    }
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.inner.api_base)
            .finish_non_exhaustive()
    }
}
