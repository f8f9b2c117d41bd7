//! Catalog listing commands.

use fresh_market_core::{CategoryId, Product};
use fresh_market_storefront::catalog::Catalog;
use fresh_market_storefront::state::AppState;

use super::{CommandError, output};

/// Which products to list.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<CategoryId>,
    pub featured: bool,
    pub bestsellers: bool,
}

impl ProductFilter {
    pub const fn category(category: CategoryId) -> Self {
        Self {
            category: Some(category),
            featured: false,
            bestsellers: false,
        }
    }

    fn select<'a>(&self, catalog: &'a Catalog) -> Vec<&'a Product> {
        let shortlist: Vec<&Product> = if self.featured {
            catalog.featured().collect()
        } else if self.bestsellers {
            catalog.bestsellers().collect()
        } else {
            catalog.products().iter().collect()
        };
        shortlist
            .into_iter()
            .filter(|p| self.category.as_ref().is_none_or(|id| &p.category_id == id))
            .collect()
    }
}

/// List all categories.
pub async fn categories(state: &AppState) -> Result<(), CommandError> {
    let catalog = state.catalog().await?;
    output::categories(catalog.categories());
    Ok(())
}

/// List in-stock products matching `filter`.
pub async fn products(state: &AppState, filter: &ProductFilter) -> Result<(), CommandError> {
    let catalog = state.catalog().await?;
    let products = filter.select(&catalog);
    tracing::debug!(count = products.len(), "Listing products");
    output::products(&products);
    Ok(())
}
