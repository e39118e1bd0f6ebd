//! Order history.

use axum::{Json, Router, extract::State, routing::get};
use tracing::instrument;

use shonifity_core::Order;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list))
}

/// The caller's orders, newest first.
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().list_for_user(user.id).await?))
}
