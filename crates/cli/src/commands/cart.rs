//! Cart maintenance.

use std::sync::Arc;

use tracing::info;

use shonifity_storefront::db::{self, PgCartRepository, PgProductRepository};
use shonifity_storefront::services::CartService;

/// Strip invalid entries from every stored cart.
///
/// Same operation as `POST /api/cart/cleanup`.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a cart cannot be saved.
pub async fn cleanup() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;

    let carts = CartService::new(
        Arc::new(PgCartRepository::new(pool.clone())),
        Arc::new(PgProductRepository::new(pool)),
    );
    let users_updated = carts.cleanup_all().await?;

    info!(users_updated, "Cart data cleaned up");
    Ok(())
}
