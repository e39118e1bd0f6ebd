//! Checkout session creation and payment confirmation.

use axum::{Json, Router, extract::State, routing::post};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use shonifity_core::OrderId;

use crate::error::{Result, add_breadcrumb};
use crate::extract::JsonBody;
use crate::middleware::RequireAuth;
use crate::services::CheckoutRequest;
use crate::services::checkout::CheckoutLine;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create-checkout-session", post(create_checkout_session))
        .route("/checkout-success", post(checkout_success))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutSessionRequest {
    #[serde(default)]
    pub products: Vec<CheckoutLine>,
    pub coupon_code: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutSessionResponse {
    pub success: bool,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Discounted total in major units.
    pub total_amount: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSuccessRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSuccessResponse {
    pub success: bool,
    pub message: &'static str,
    pub order_id: OrderId,
    pub total_amount: Decimal,
    pub is_existing: bool,
}

#[instrument(skip(state, body), fields(user_id = %user.id, lines = body.products.len()))]
pub async fn create_checkout_session(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateCheckoutSessionRequest>,
) -> Result<Json<CreateCheckoutSessionResponse>> {
    let ids: Vec<String> = body.products.iter().map(|l| l.id.to_string()).collect();
    add_breadcrumb(
        "checkout",
        "Creating checkout session",
        &[
            ("products", &ids.join(",")),
            ("coupon", body.coupon_code.as_deref().unwrap_or("")),
        ],
    );

    let session = state
        .checkout()
        .create_session(
            user.id,
            CheckoutRequest {
                lines: body.products,
                coupon_code: body.coupon_code,
                currency: body.currency,
            },
        )
        .await?;

    Ok(Json(CreateCheckoutSessionResponse {
        success: true,
        id: session.id,
        url: session.url,
        total_amount: session.total_amount.to_major(),
    }))
}

/// Record the order for a paid session. Safe to call repeatedly.
#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn checkout_success(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CheckoutSuccessRequest>,
) -> Result<Json<CheckoutSuccessResponse>> {
    let session_id = body.session_id.unwrap_or_default();
    add_breadcrumb("checkout", "Confirming payment", &[("session_id", &session_id)]);

    let confirmation = state.checkout().confirm(&session_id).await?;
    let message = if confirmation.is_existing {
        "Order already processed successfully"
    } else {
        "Payment successful, order created"
    };

    Ok(Json(CheckoutSuccessResponse {
        success: true,
        message,
        order_id: confirmation.order.id,
        total_amount: confirmation.order.total_amount,
        is_existing: confirmation.is_existing,
    }))
}
