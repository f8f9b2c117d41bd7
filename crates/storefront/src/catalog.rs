//! Product catalog read path.
//!
//! A [`Catalog`] is a snapshot of categories and in-stock products, loaded
//! once and filtered in memory. Caching across loads is the repository's
//! concern (see [`crate::backend::RestBackend`]).

use tracing::instrument;

use fresh_market_core::{Category, CategoryId, Product, ProductId};

use crate::backend::{BackendError, CatalogRepository};

/// Loaded categories and products, both ordered by name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    categories: Vec<Category>,
    products: Vec<Product>,
}

impl Catalog {
    /// Build a catalog from already-fetched rows.
    ///
    /// Sorts both lists by name and drops out-of-stock products.
    #[must_use]
    pub fn new(mut categories: Vec<Category>, mut products: Vec<Product>) -> Self {
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        products.retain(|p| p.in_stock);
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            categories,
            products,
        }
    }

    /// Fetch categories and products concurrently.
    ///
    /// # Errors
    ///
    /// Returns an error if either request fails.
    #[instrument(skip(repository))]
    pub async fn load<R: CatalogRepository>(repository: &R) -> Result<Self, BackendError> {
        let (categories, products) =
            tokio::try_join!(repository.list_categories(), repository.list_products())?;
        tracing::debug!(
            categories = categories.len(),
            products = products.len(),
            "Catalog loaded"
        );
        Ok(Self::new(categories, products))
    }

    /// Drop cached responses and load again.
    ///
    /// # Errors
    ///
    /// Returns an error if either request fails; `self` is left unchanged.
    pub async fn refetch<R: CatalogRepository>(
        &mut self,
        repository: &R,
    ) -> Result<(), BackendError> {
        repository.invalidate();
        *self = Self::load(repository).await?;
        Ok(())
    }

    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    #[must_use]
    pub fn category(&self, id: &CategoryId) -> Option<&Category> {
        self.categories.iter().find(|c| &c.id == id)
    }

    #[must_use]
    pub fn product(&self, id: &ProductId) -> Option<&Product> {
        self.products.iter().find(|p| &p.id == id)
    }

    /// Products in a category; `None` means all products.
    pub fn products_by_category<'a>(
        &'a self,
        category: Option<&'a CategoryId>,
    ) -> impl Iterator<Item = &'a Product> {
        self.products
            .iter()
            .filter(move |p| category.is_none_or(|id| &p.category_id == id))
    }

    pub fn featured(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| p.is_featured)
    }

    pub fn bestsellers(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| p.is_bestseller)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rust_decimal::Decimal;

    use super::*;

    fn category(id: &str, name: &str) -> Category {
        Category {
            id: CategoryId::new(id),
            name: name.to_string(),
            description: String::new(),
            image_url: None,
        }
    }

    fn product(id: &str, name: &str, category: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_string(),
            description: String::new(),
            price: Decimal::new(199, 2),
            image_url: None,
            unit: "each".to_string(),
            category_id: CategoryId::new(category),
            in_stock: true,
            stock_quantity: None,
            is_featured: false,
            is_bestseller: false,
            discount_percentage: None,
            category: None,
        }
    }

    #[derive(Default)]
    struct StaticCatalog {
        invalidations: Arc<AtomicUsize>,
    }

    impl CatalogRepository for StaticCatalog {
        async fn list_categories(&self) -> Result<Vec<Category>, BackendError> {
            Ok(vec![category("fruit", "Fruit"), category("bakery", "Bakery")])
        }

        async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
            let mut featured = product("p2", "Apples", "fruit");
            featured.is_featured = true;
            Ok(vec![
                product("p1", "Sourdough", "bakery"),
                featured,
                product("p3", "Bananas", "fruit"),
            ])
        }

        fn invalidate(&self) {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_new_sorts_and_drops_out_of_stock() {
        let mut gone = product("p9", "Anchovies", "fish");
        gone.in_stock = false;
        let catalog = Catalog::new(
            vec![category("b", "Bakery"), category("a", "Apples")],
            vec![product("p1", "Zucchini", "veg"), gone],
        );

        assert_eq!(catalog.categories().first().unwrap().name, "Apples");
        assert_eq!(catalog.products().len(), 1);
    }

    #[tokio::test]
    async fn test_load_and_filter() {
        let catalog = Catalog::load(&StaticCatalog::default()).await.unwrap();

        let names: Vec<_> = catalog.products().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Apples", "Bananas", "Sourdough"]);

        let fruit = CategoryId::new("fruit");
        assert_eq!(catalog.products_by_category(Some(&fruit)).count(), 2);
        assert_eq!(catalog.products_by_category(None).count(), 3);
        assert_eq!(catalog.featured().count(), 1);
        assert_eq!(catalog.bestsellers().count(), 0);
        assert_eq!(
            catalog.product(&ProductId::new("p1")).unwrap().name,
            "Sourdough"
        );
        assert_eq!(catalog.category(&fruit).unwrap().name, "Fruit");
    }

    #[tokio::test]
    async fn test_refetch_invalidates_cache() {
        let repo = StaticCatalog::default();
        let mut catalog = Catalog::default();
        catalog.refetch(&repo).await.unwrap();

        assert_eq!(repo.invalidations.load(Ordering::SeqCst), 1);
        assert_eq!(catalog.products().len(), 3);
    }
}
