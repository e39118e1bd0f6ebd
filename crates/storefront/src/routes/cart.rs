//! Cart API handlers.
//!
//! Mutations answer with the raw stored cart (`[{product, quantity}]`);
//! `GET /cart` answers with the priced cart.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use shonifity_core::{Cart, CartTotals, ProductId};

use crate::error::{AppError, Result};
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::services::PricedCartItem;
use crate::state::AppState;

/// Build the cart router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(show).post(add).delete(remove))
        .route("/summary", get(summary))
        .route("/cleanup", post(cleanup))
        .route("/{id}", put(update_quantity))
}

/// Body of `POST /cart` and `DELETE /cart`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    pub product_id: Option<ProductId>,
}

/// Body of `PUT /cart/{id}`.
#[derive(Debug, Deserialize)]
pub struct QuantityUpdate {
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub message: &'static str,
    pub users_updated: usize,
}

/// Priced cart, `[]` when empty.
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<PricedCartItem>>> {
    Ok(Json(state.cart().price_cart(user.id).await?))
}

/// Add one unit of a product.
#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn add(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ProductRef>,
) -> Result<Json<Cart>> {
    let product = body
        .product_id
        .ok_or_else(|| AppError::BadRequest("Product ID is required".to_string()))?;
    Ok(Json(state.cart().add_item(user.id, product).await?))
}

/// Remove one product, or clear the cart when the body names none.
///
/// The body is optional: an empty body clears the cart.
#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn remove(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Cart>> {
    let target = if body.iter().all(u8::is_ascii_whitespace) {
        ProductRef::default()
    } else {
        serde_json::from_slice::<ProductRef>(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))?
    };
    Ok(Json(state.cart().remove_item(user.id, target.product_id).await?))
}

/// Replace the quantity of a product in the cart; `0` removes it.
#[instrument(skip(state, body), fields(user_id = %user.id, product_id = %id))]
pub async fn update_quantity(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    PathParam(id): PathParam<ProductId>,
    JsonBody(body): JsonBody<QuantityUpdate>,
) -> Result<Json<Cart>> {
    let quantity = body
        .quantity
        .ok_or_else(|| AppError::BadRequest("Quantity is required".to_string()))?;
    Ok(Json(state.cart().set_quantity(user.id, id, quantity).await?))
}

/// Subtotal and total, discounted by the caller's coupon when one is named.
///
/// An unknown or inactive coupon code is ignored.
#[instrument(skip(state, query), fields(user_id = %user.id))]
pub async fn summary(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<SummaryQuery>,
) -> Result<Json<CartTotals>> {
    let discount = match query.coupon_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => state
            .coupons()
            .validate(code, user.id)
            .await?
            .map(|c| c.discount_percentage),
        _ => None,
    };
    Ok(Json(state.cart().summary(user.id, discount).await?))
}

/// Strip invalid entries from every user's cart (admin only).
#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn cleanup(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<CleanupResponse>> {
    let users_updated = state.cart().cleanup_all().await?;
    Ok(Json(CleanupResponse {
        message: "Cart data cleaned up successfully",
        users_updated,
    }))
}
