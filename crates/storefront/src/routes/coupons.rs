//! Coupon lookup and validation.

use axum::{Json, Router, extract::State, routing::get, routing::post};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use shonifity_core::Coupon;

use crate::error::{AppError, Result};
use crate::extract::JsonBody;
use crate::middleware::RequireAuth;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(active))
        .route("/validate", post(validate))
}

#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponResponse {
    pub message: &'static str,
    pub code: String,
    pub discount_percentage: u8,
}

/// The caller's active coupon, or `null`.
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn active(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Option<Coupon>>> {
    Ok(Json(state.coupons().active_for(user.id).await?))
}

#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn validate(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ValidateCouponRequest>,
) -> Result<Json<ValidateCouponResponse>> {
    let coupon = state
        .coupons()
        .validate(body.code.trim(), user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Coupon not found".to_string()))?;

    Ok(Json(ValidateCouponResponse {
        message: "Coupon is valid",
        code: coupon.code,
        discount_percentage: coupon.discount_percentage,
    }))
}
