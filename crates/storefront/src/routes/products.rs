//! Catalog handlers. All public.

use axum::{Json, Router, extract::State, routing::get};
use tracing::instrument;

use shonifity_core::{Product, ProductId};

use crate::db::RepositoryError;
use crate::error::{AppError, Result};
use crate::extract::PathParam;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/featured", get(featured))
        .route("/recommendations", get(recommendations))
        .route("/category/{category}", get(by_category))
        .route("/{id}", get(show))
}

#[instrument(skip(state))]
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.catalog().list_all().await?))
}

/// Featured products, served from cache.
#[instrument(skip(state))]
pub async fn featured(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let featured = state.catalog().list_featured().await?;
    Ok(Json(featured.as_ref().clone()))
}

#[instrument(skip(state))]
pub async fn by_category(
    State(state): State<AppState>,
    PathParam(category): PathParam<String>,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.catalog().list_by_category(&category).await?))
}

/// Up to four random products.
#[instrument(skip(state))]
pub async fn recommendations(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.catalog().recommendations().await?))
}

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    PathParam(id): PathParam<ProductId>,
) -> Result<Json<Product>> {
    match state.catalog().get(id).await {
        Ok(product) => Ok(Json(product)),
        Err(RepositoryError::NotFound) => Err(AppError::NotFound("Product not found".to_string())),
        Err(e) => Err(e.into()),
    }
}
