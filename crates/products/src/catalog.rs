//! Catalog service: category and product CRUD with uniqueness checks.

use chrono::Utc;
use tracing::instrument;

use tallyerp_core::{
    CategoryId, DomainError, DomainResult, Page, Pagination, ProductId, Store, UnitOfWork,
};

use crate::category::{Category, CategoryDraft};
use crate::product::{Product, ProductDraft};
use crate::repository::{CategoryRepository, ProductFilter, ProductRepository};

pub struct Catalog<S> {
    store: S,
}

impl<S> Catalog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> Catalog<S>
where
    S: Store,
    S::Tx: CategoryRepository + ProductRepository,
{
    #[instrument(skip(self, draft))]
    pub async fn create_category(&self, draft: CategoryDraft) -> DomainResult<Category> {
        let draft = draft.validated()?;
        let mut tx = self.store.begin().await?;

        if tx.find_category_by_name(&draft.name).await?.is_some() {
            return Err(DomainError::conflict(format!(
                "category '{}' already exists",
                draft.name
            )));
        }

        let now = Utc::now();
        let category = Category {
            id: CategoryId::new(),
            name: draft.name,
            description: draft.description,
            created_at: now,
            updated_at: now,
        };
        tx.insert_category(&category).await?;
        tx.commit().await?;

        tracing::info!(category_id = %category.id, "category created");
        Ok(category)
    }

    #[instrument(skip(self, draft))]
    pub async fn update_category(
        &self,
        id: CategoryId,
        draft: CategoryDraft,
    ) -> DomainResult<Category> {
        let draft = draft.validated()?;
        let mut tx = self.store.begin().await?;

        let mut category = tx
            .find_category(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("category {id}")))?;

        if let Some(other) = tx.find_category_by_name(&draft.name).await? {
            if other.id != id {
                return Err(DomainError::conflict(format!(
                    "category '{}' already exists",
                    draft.name
                )));
            }
        }

        category.name = draft.name;
        category.description = draft.description;
        category.updated_at = Utc::now();
        tx.update_category(&category).await?;
        tx.commit().await?;

        Ok(category)
    }

    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: CategoryId) -> DomainResult<()> {
        let mut tx = self.store.begin().await?;

        if tx.find_category(id).await?.is_none() {
            return Err(DomainError::not_found(format!("category {id}")));
        }
        let products = tx.count_products_in_category(id).await?;
        if products > 0 {
            return Err(DomainError::conflict(format!(
                "category {id} still has {products} product(s)"
            )));
        }

        tx.delete_category(id).await?;
        tx.commit().await?;

        tracing::info!(category_id = %id, "category deleted");
        Ok(())
    }

    pub async fn get_category(&self, id: CategoryId) -> DomainResult<Category> {
        let mut tx = self.store.begin().await?;
        let category = tx.find_category(id).await?;
        tx.rollback().await?;
        category.ok_or_else(|| DomainError::not_found(format!("category {id}")))
    }

    pub async fn list_categories(&self) -> DomainResult<Vec<Category>> {
        let mut tx = self.store.begin().await?;
        let categories = tx.list_categories().await?;
        tx.rollback().await?;
        Ok(categories)
    }

    #[instrument(skip(self, draft), fields(code = %draft.code))]
    pub async fn create_product(&self, draft: ProductDraft) -> DomainResult<Product> {
        let draft = draft.validated()?;
        let mut tx = self.store.begin().await?;

        ensure_category_exists(&mut tx, draft.category_id).await?;
        if tx.find_product_by_code(&draft.code).await?.is_some() {
            return Err(DomainError::conflict(format!(
                "product code '{}' already exists",
                draft.code
            )));
        }

        let product = draft.into_product(ProductId::new(), Utc::now());
        tx.insert_product(&product).await?;
        tx.commit().await?;

        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    #[instrument(skip(self, draft))]
    pub async fn update_product(&self, id: ProductId, draft: ProductDraft) -> DomainResult<Product> {
        let draft = draft.validated()?;
        let mut tx = self.store.begin().await?;

        let existing = tx
            .find_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("product {id}")))?;

        ensure_category_exists(&mut tx, draft.category_id).await?;
        if let Some(other) = tx.find_product_by_code(&draft.code).await? {
            if other.id != id {
                return Err(DomainError::conflict(format!(
                    "product code '{}' already exists",
                    draft.code
                )));
            }
        }

        let product = draft.into_product(id, existing.created_at);
        tx.update_product(&product).await?;
        tx.commit().await?;

        Ok(product)
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> DomainResult<()> {
        let mut tx = self.store.begin().await?;

        if tx.find_product(id).await?.is_none() {
            return Err(DomainError::not_found(format!("product {id}")));
        }
        if tx.product_in_use(id).await? {
            return Err(DomainError::conflict(format!(
                "product {id} is referenced by stock transactions or purchase orders"
            )));
        }

        tx.delete_product(id).await?;
        tx.commit().await?;

        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }

    pub async fn get_product(&self, id: ProductId) -> DomainResult<Product> {
        let mut tx = self.store.begin().await?;
        let product = tx.find_product(id).await?;
        tx.rollback().await?;
        product.ok_or_else(|| DomainError::not_found(format!("product {id}")))
    }

    pub async fn search_products(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> DomainResult<Page<Product>> {
        let mut tx = self.store.begin().await?;
        let page = tx.search_products(filter, pagination).await?;
        tx.rollback().await?;
        Ok(page)
    }
}

async fn ensure_category_exists<T>(tx: &mut T, id: CategoryId) -> DomainResult<()>
where
    T: CategoryRepository + ?Sized,
{
    match tx.find_category(id).await? {
        Some(_) => Ok(()),
        None => Err(DomainError::not_found(format!("category {id}"))),
    }
}
