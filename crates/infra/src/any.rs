//! Runtime selection between the in-memory and Postgres backends.

use std::collections::HashMap;

use async_trait::async_trait;

use tallyerp_core::{
    CategoryId, DomainResult, Page, Pagination, ProductId, PurchaseOrderId, PurchaseOrderItemId,
    Store, SupplierId, UnitOfWork,
};
use tallyerp_inventory::{StockMovementFilter, StockRepository, StockTotals, StockTransaction};
use tallyerp_parties::{Supplier, SupplierFilter, SupplierRepository};
use tallyerp_products::{
    Category, CategoryRepository, Product, ProductFilter, ProductRepository,
};
use tallyerp_purchasing::{
    PurchaseOrder, PurchaseOrderFilter, PurchaseOrderItem, PurchaseOrderRepository,
};

use crate::in_memory::{InMemoryStore, InMemoryTx};
use crate::postgres::{PostgresStore, PostgresTx};

/// Store chosen at startup.
#[derive(Debug, Clone)]
pub enum AnyStore {
    InMemory(InMemoryStore),
    Postgres(PostgresStore),
}

impl AnyStore {
    pub fn backend(&self) -> &'static str {
        match self {
            AnyStore::InMemory(_) => "in_memory",
            AnyStore::Postgres(_) => "postgres",
        }
    }
}

impl From<InMemoryStore> for AnyStore {
    fn from(store: InMemoryStore) -> Self {
        AnyStore::InMemory(store)
    }
}

impl From<PostgresStore> for AnyStore {
    fn from(store: PostgresStore) -> Self {
        AnyStore::Postgres(store)
    }
}

#[async_trait]
impl Store for AnyStore {
    type Tx = AnyTx;

    async fn begin(&self) -> DomainResult<AnyTx> {
        match self {
            AnyStore::InMemory(store) => Ok(AnyTx::InMemory(store.begin().await?)),
            AnyStore::Postgres(store) => Ok(AnyTx::Postgres(store.begin().await?)),
        }
    }
}

pub enum AnyTx {
    InMemory(InMemoryTx),
    Postgres(PostgresTx),
}

macro_rules! dispatch {
    ($self:ident . $method:ident ( $($arg:expr),* )) => {
        match $self {
            AnyTx::InMemory(tx) => tx.$method($($arg),*).await,
            AnyTx::Postgres(tx) => tx.$method($($arg),*).await,
        }
    };
}

#[async_trait]
impl UnitOfWork for AnyTx {
    async fn commit(self) -> DomainResult<()> {
        dispatch!(self.commit())
    }

    async fn rollback(self) -> DomainResult<()> {
        dispatch!(self.rollback())
    }
}

#[async_trait]
impl CategoryRepository for AnyTx {
    async fn insert_category(&mut self, category: &Category) -> DomainResult<()> {
        dispatch!(self.insert_category(category))
    }

    async fn update_category(&mut self, category: &Category) -> DomainResult<()> {
        dispatch!(self.update_category(category))
    }

    async fn delete_category(&mut self, id: CategoryId) -> DomainResult<bool> {
        dispatch!(self.delete_category(id))
    }

    async fn find_category(&mut self, id: CategoryId) -> DomainResult<Option<Category>> {
        dispatch!(self.find_category(id))
    }

    async fn find_category_by_name(&mut self, name: &str) -> DomainResult<Option<Category>> {
        dispatch!(self.find_category_by_name(name))
    }

    async fn list_categories(&mut self) -> DomainResult<Vec<Category>> {
        dispatch!(self.list_categories())
    }
}

#[async_trait]
impl ProductRepository for AnyTx {
    async fn insert_product(&mut self, product: &Product) -> DomainResult<()> {
        dispatch!(self.insert_product(product))
    }

    async fn update_product(&mut self, product: &Product) -> DomainResult<()> {
        dispatch!(self.update_product(product))
    }

    async fn delete_product(&mut self, id: ProductId) -> DomainResult<bool> {
        dispatch!(self.delete_product(id))
    }

    async fn find_product(&mut self, id: ProductId) -> DomainResult<Option<Product>> {
        dispatch!(self.find_product(id))
    }

    async fn find_product_by_code(&mut self, code: &str) -> DomainResult<Option<Product>> {
        dispatch!(self.find_product_by_code(code))
    }

    async fn search_products(
        &mut self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> DomainResult<Page<Product>> {
        dispatch!(self.search_products(filter, pagination))
    }

    async fn count_products_in_category(&mut self, id: CategoryId) -> DomainResult<u64> {
        dispatch!(self.count_products_in_category(id))
    }

    async fn product_in_use(&mut self, id: ProductId) -> DomainResult<bool> {
        dispatch!(self.product_in_use(id))
    }
}

#[async_trait]
impl SupplierRepository for AnyTx {
    async fn insert_supplier(&mut self, supplier: &Supplier) -> DomainResult<()> {
        dispatch!(self.insert_supplier(supplier))
    }

    async fn update_supplier(&mut self, supplier: &Supplier) -> DomainResult<()> {
        dispatch!(self.update_supplier(supplier))
    }

    async fn delete_supplier(&mut self, id: SupplierId) -> DomainResult<bool> {
        dispatch!(self.delete_supplier(id))
    }

    async fn find_supplier(&mut self, id: SupplierId) -> DomainResult<Option<Supplier>> {
        dispatch!(self.find_supplier(id))
    }

    async fn find_supplier_by_email(&mut self, email: &str) -> DomainResult<Option<Supplier>> {
        dispatch!(self.find_supplier_by_email(email))
    }

    async fn search_suppliers(
        &mut self,
        filter: &SupplierFilter,
        pagination: Pagination,
    ) -> DomainResult<Page<Supplier>> {
        dispatch!(self.search_suppliers(filter, pagination))
    }

    async fn supplier_in_use(&mut self, id: SupplierId) -> DomainResult<bool> {
        dispatch!(self.supplier_in_use(id))
    }
}

#[async_trait]
impl StockRepository for AnyTx {
    async fn append_transaction(&mut self, transaction: &StockTransaction) -> DomainResult<()> {
        dispatch!(self.append_transaction(transaction))
    }

    async fn stock_totals(&mut self, product_id: ProductId) -> DomainResult<StockTotals> {
        dispatch!(self.stock_totals(product_id))
    }

    async fn stock_totals_by_product(&mut self) -> DomainResult<HashMap<ProductId, StockTotals>> {
        dispatch!(self.stock_totals_by_product())
    }

    async fn search_transactions(
        &mut self,
        filter: &StockMovementFilter,
        pagination: Pagination,
    ) -> DomainResult<Page<StockTransaction>> {
        dispatch!(self.search_transactions(filter, pagination))
    }

    async fn list_transactions(
        &mut self,
        filter: &StockMovementFilter,
    ) -> DomainResult<Vec<StockTransaction>> {
        dispatch!(self.list_transactions(filter))
    }
}

#[async_trait]
impl PurchaseOrderRepository for AnyTx {
    async fn insert_order(&mut self, order: &PurchaseOrder) -> DomainResult<()> {
        dispatch!(self.insert_order(order))
    }

    async fn update_order(&mut self, order: &PurchaseOrder) -> DomainResult<()> {
        dispatch!(self.update_order(order))
    }

    async fn find_order(&mut self, id: PurchaseOrderId) -> DomainResult<Option<PurchaseOrder>> {
        dispatch!(self.find_order(id))
    }

    async fn find_order_for_update(
        &mut self,
        id: PurchaseOrderId,
    ) -> DomainResult<Option<PurchaseOrder>> {
        dispatch!(self.find_order_for_update(id))
    }

    async fn search_orders(
        &mut self,
        filter: &PurchaseOrderFilter,
        pagination: Pagination,
    ) -> DomainResult<Page<PurchaseOrder>> {
        dispatch!(self.search_orders(filter, pagination))
    }

    async fn insert_item(&mut self, item: &PurchaseOrderItem) -> DomainResult<()> {
        dispatch!(self.insert_item(item))
    }

    async fn update_item(&mut self, item: &PurchaseOrderItem) -> DomainResult<()> {
        dispatch!(self.update_item(item))
    }

    async fn delete_item(&mut self, id: PurchaseOrderItemId) -> DomainResult<bool> {
        dispatch!(self.delete_item(id))
    }

    async fn find_item(
        &mut self,
        id: PurchaseOrderItemId,
    ) -> DomainResult<Option<PurchaseOrderItem>> {
        dispatch!(self.find_item(id))
    }

    async fn items_for_order(
        &mut self,
        order_id: PurchaseOrderId,
    ) -> DomainResult<Vec<PurchaseOrderItem>> {
        dispatch!(self.items_for_order(order_id))
    }

    async fn delete_items_for_order(&mut self, order_id: PurchaseOrderId) -> DomainResult<u64> {
        dispatch!(self.delete_items_for_order(order_id))
    }
}
