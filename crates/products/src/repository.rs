//! Persistence ports for the catalog.
//!
//! Backends implement these on their unit-of-work type.

use async_trait::async_trait;

use tallyerp_core::{CategoryId, DomainResult, Page, Pagination, ProductId};

use crate::category::Category;
use crate::product::Product;

#[async_trait]
pub trait CategoryRepository: Send {
    async fn insert_category(&mut self, category: &Category) -> DomainResult<()>;

    async fn update_category(&mut self, category: &Category) -> DomainResult<()>;

    /// Returns `false` when no row was deleted.
    async fn delete_category(&mut self, id: CategoryId) -> DomainResult<bool>;

    async fn find_category(&mut self, id: CategoryId) -> DomainResult<Option<Category>>;

    async fn find_category_by_name(&mut self, name: &str) -> DomainResult<Option<Category>>;

    /// All categories, ordered by name.
    async fn list_categories(&mut self) -> DomainResult<Vec<Category>>;
}

/// Typed product search criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    /// Case-insensitive substring match on code or name.
    pub text: Option<String>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(category_id) = self.category_id {
            if product.category_id != category_id {
                return false;
            }
        }
        match self.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => {
                let needle = text.to_lowercase();
                product.code.to_lowercase().contains(&needle)
                    || product.name.to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }
}

#[async_trait]
pub trait ProductRepository: Send {
    async fn insert_product(&mut self, product: &Product) -> DomainResult<()>;

    async fn update_product(&mut self, product: &Product) -> DomainResult<()>;

    /// Returns `false` when no row was deleted.
    async fn delete_product(&mut self, id: ProductId) -> DomainResult<bool>;

    async fn find_product(&mut self, id: ProductId) -> DomainResult<Option<Product>>;

    async fn find_product_by_code(&mut self, code: &str) -> DomainResult<Option<Product>>;

    /// Matching products ordered by code.
    async fn search_products(
        &mut self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> DomainResult<Page<Product>>;

    async fn count_products_in_category(&mut self, id: CategoryId) -> DomainResult<u64>;

    /// Whether any stock transaction or purchase-order item references the product.
    async fn product_in_use(&mut self, id: ProductId) -> DomainResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(code: &str, name: &str, category_id: CategoryId) -> Product {
        Product {
            id: ProductId::new(),
            code: code.to_string(),
            name: name.to_string(),
            category_id,
            description: None,
            unit: "pcs".to_string(),
            cost_price: 0,
            selling_price: 0,
            min_stock: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn text_filter_matches_code_or_name_case_insensitively() {
        let cat = CategoryId::new();
        let p = product("BOLT-M8", "Hex bolt", cat);

        let by_code = ProductFilter { text: Some("bolt-m".into()), ..Default::default() };
        let by_name = ProductFilter { text: Some("HEX".into()), ..Default::default() };
        let miss = ProductFilter { text: Some("washer".into()), ..Default::default() };

        assert!(by_code.matches(&p));
        assert!(by_name.matches(&p));
        assert!(!miss.matches(&p));
    }

    #[test]
    fn category_filter_excludes_other_categories() {
        let p = product("A", "a", CategoryId::new());
        let filter = ProductFilter { category_id: Some(CategoryId::new()), text: None };
        assert!(!filter.matches(&p));
        assert!(ProductFilter::default().matches(&p));
    }
}
