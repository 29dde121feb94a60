//! Supplier CRUD with email uniqueness.

use chrono::Utc;
use tracing::instrument;

use tallyerp_core::{DomainError, DomainResult, Page, Pagination, Store, SupplierId, UnitOfWork};

use crate::supplier::{Supplier, SupplierDraft, SupplierFilter, SupplierRepository};

pub struct SupplierDirectory<S> {
    store: S,
}

impl<S> SupplierDirectory<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> SupplierDirectory<S>
where
    S: Store,
    S::Tx: SupplierRepository,
{
    #[instrument(skip(self, draft))]
    pub async fn create(&self, draft: SupplierDraft) -> DomainResult<Supplier> {
        let draft = draft.validated()?;
        let mut tx = self.store.begin().await?;

        if tx.find_supplier_by_email(&draft.email).await?.is_some() {
            return Err(DomainError::conflict(format!(
                "supplier email '{}' already exists",
                draft.email
            )));
        }

        let now = Utc::now();
        let supplier = Supplier {
            id: SupplierId::new(),
            name: draft.name,
            email: draft.email,
            phone: draft.phone,
            address: draft.address,
            created_at: now,
            updated_at: now,
        };
        tx.insert_supplier(&supplier).await?;
        tx.commit().await?;

        tracing::info!(supplier_id = %supplier.id, "supplier created");
        Ok(supplier)
    }

    #[instrument(skip(self, draft))]
    pub async fn update(&self, id: SupplierId, draft: SupplierDraft) -> DomainResult<Supplier> {
        let draft = draft.validated()?;
        let mut tx = self.store.begin().await?;

        let mut supplier = tx
            .find_supplier(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("supplier {id}")))?;

        if let Some(other) = tx.find_supplier_by_email(&draft.email).await? {
            if other.id != id {
                return Err(DomainError::conflict(format!(
                    "supplier email '{}' already exists",
                    draft.email
                )));
            }
        }

        supplier.name = draft.name;
        supplier.email = draft.email;
        supplier.phone = draft.phone;
        supplier.address = draft.address;
        supplier.updated_at = Utc::now();
        tx.update_supplier(&supplier).await?;
        tx.commit().await?;

        Ok(supplier)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: SupplierId) -> DomainResult<()> {
        let mut tx = self.store.begin().await?;

        if tx.find_supplier(id).await?.is_none() {
            return Err(DomainError::not_found(format!("supplier {id}")));
        }
        if tx.supplier_in_use(id).await? {
            return Err(DomainError::conflict(format!(
                "supplier {id} is referenced by purchase orders"
            )));
        }

        tx.delete_supplier(id).await?;
        tx.commit().await?;

        tracing::info!(supplier_id = %id, "supplier deleted");
        Ok(())
    }

    pub async fn get(&self, id: SupplierId) -> DomainResult<Supplier> {
        let mut tx = self.store.begin().await?;
        let supplier = tx.find_supplier(id).await?;
        tx.rollback().await?;
        supplier.ok_or_else(|| DomainError::not_found(format!("supplier {id}")))
    }

    pub async fn search(
        &self,
        filter: &SupplierFilter,
        pagination: Pagination,
    ) -> DomainResult<Page<Supplier>> {
        let mut tx = self.store.begin().await?;
        let page = tx.search_suppliers(filter, pagination).await?;
        tx.rollback().await?;
        Ok(page)
    }
}
