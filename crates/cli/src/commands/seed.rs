//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! products:
//!   - name: Wireless Headphones
//!     description: Over-ear, noise cancelling
//!     price: "129.99"
//!     category: electronics
//!     image: https://cdn.example.com/headphones.jpg
//!     isFeatured: true
//! ```
//!
//! Products are matched by name: existing rows are updated in place.

use std::path::Path;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};

use shonifity_storefront::db::{self, NewProduct, PgProductRepository};
use shonifity_storefront::services::CatalogService;

/// Top level of a catalog file.
#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    pub products: Vec<NewProduct>,
}

/// Problems that would make a product unusable in the storefront.
pub fn validate_catalog(catalog: &CatalogFile) -> Vec<String> {
    let mut errors = Vec::new();
    if catalog.products.is_empty() {
        errors.push("catalog contains no products".to_string());
    }
    for (i, product) in catalog.products.iter().enumerate() {
        let label = if product.name.trim().is_empty() {
            format!("product #{}", i + 1)
        } else {
            product.name.clone()
        };
        if product.name.trim().is_empty() {
            errors.push(format!("{label}: name is empty"));
        }
        if product.price < Decimal::ZERO {
            errors.push(format!("{label}: price must not be negative"));
        }
        if product.category.trim().is_empty() {
            errors.push(format!("{label}: category is empty"));
        }
    }
    errors
}

/// Upsert every product in `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, validation fails,
/// or database operations fail.
pub async fn products(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;

    // Verify file exists
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let catalog: CatalogFile = serde_yaml::from_str(&content)?;

    let errors = validate_catalog(&catalog);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let catalog_service = CatalogService::new(Arc::new(PgProductRepository::new(pool)));
    let seeded = catalog_service.seed(catalog.products).await?;

    info!("Seeding complete!");
    info!("  Products upserted: {}", seeded.len());
    Ok(())
}
