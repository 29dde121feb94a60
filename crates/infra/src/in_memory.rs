//! In-memory unit-of-work backend for tests and local development.
//!
//! Units of work are serialised behind an async mutex. Each one snapshots the
//! whole state on `begin` and restores it unless `commit` is called, so a
//! failed or abandoned operation leaves no trace.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use tallyerp_core::{
    CategoryId, DomainError, DomainResult, Entity, Page, Pagination, ProductId, PurchaseOrderId,
    PurchaseOrderItemId, Store, SupplierId, UnitOfWork,
};
use tallyerp_inventory::{StockMovementFilter, StockRepository, StockTotals, StockTransaction};
use tallyerp_parties::{Supplier, SupplierFilter, SupplierRepository};
use tallyerp_products::{
    Category, CategoryRepository, Product, ProductFilter, ProductRepository,
};
use tallyerp_purchasing::{
    PurchaseOrder, PurchaseOrderFilter, PurchaseOrderItem, PurchaseOrderRepository,
};

#[derive(Debug, Default, Clone)]
struct State {
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    suppliers: BTreeMap<SupplierId, Supplier>,
    stock: Vec<StockTransaction>,
    orders: BTreeMap<PurchaseOrderId, PurchaseOrder>,
    items: Vec<PurchaseOrderItem>,
}

const NO_FAULT: usize = usize::MAX;

#[derive(Debug)]
struct Faults {
    /// Stock appends still allowed to succeed; `NO_FAULT` disables injection.
    stock_appends_left: AtomicUsize,
}

impl Faults {
    fn take_stock_append(&self) -> DomainResult<()> {
        let outcome = self
            .stock_appends_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                NO_FAULT => Some(NO_FAULT),
                0 => None,
                n => Some(n - 1),
            });
        match outcome {
            Ok(_) => Ok(()),
            Err(_) => Err(DomainError::internal("injected stock append failure")),
        }
    }
}

/// In-memory store. Cloning shares the underlying state.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
    faults: Arc<Faults>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            faults: Arc::new(Faults {
                stock_appends_left: AtomicUsize::new(NO_FAULT),
            }),
        }
    }

    /// Let the next `successes` stock appends through, then fail every
    /// following one with `Internal` until `clear_faults` is called.
    pub fn fail_stock_appends_after(&self, successes: usize) {
        self.faults
            .stock_appends_left
            .store(successes, Ordering::SeqCst);
    }

    pub fn clear_faults(&self) {
        self.faults
            .stock_appends_left
            .store(NO_FAULT, Ordering::SeqCst);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> DomainResult<InMemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let snapshot = guard.clone();
        Ok(InMemoryTx {
            state: guard,
            snapshot: Some(snapshot),
            faults: self.faults.clone(),
        })
    }
}

/// Exclusive handle on the in-memory state for one unit of work.
pub struct InMemoryTx {
    state: OwnedMutexGuard<State>,
    /// State as of `begin`; `None` once committed.
    snapshot: Option<State>,
    faults: Arc<Faults>,
}

impl Drop for InMemoryTx {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.state = snapshot;
        }
    }
}

#[async_trait]
impl UnitOfWork for InMemoryTx {
    async fn commit(mut self) -> DomainResult<()> {
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(self) -> DomainResult<()> {
        Ok(())
    }
}

fn duplicate(what: &str, value: &str) -> DomainError {
    DomainError::conflict(format!("{what} '{value}' already exists"))
}

fn missing(what: &str, id: impl core::fmt::Display) -> DomainError {
    DomainError::not_found(format!("{what} {id}"))
}

/// Overwrite an existing row keyed by the entity's id.
fn replace<E>(rows: &mut BTreeMap<E::Id, E>, entity: &E, what: &str) -> DomainResult<()>
where
    E: Entity + Clone,
    E::Id: Ord + core::fmt::Display,
{
    let slot = rows
        .get_mut(&entity.id())
        .ok_or_else(|| missing(what, entity.id()))?;
    *slot = entity.clone();
    Ok(())
}

#[async_trait]
impl CategoryRepository for InMemoryTx {
    async fn insert_category(&mut self, category: &Category) -> DomainResult<()> {
        if self.state.categories.values().any(|c| c.name == category.name) {
            return Err(duplicate("category", &category.name));
        }
        self.state.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn update_category(&mut self, category: &Category) -> DomainResult<()> {
        if self
            .state
            .categories
            .values()
            .any(|c| c.id != category.id && c.name == category.name)
        {
            return Err(duplicate("category", &category.name));
        }
        replace(&mut self.state.categories, category, "category")
    }

    async fn delete_category(&mut self, id: CategoryId) -> DomainResult<bool> {
        Ok(self.state.categories.remove(&id).is_some())
    }

    async fn find_category(&mut self, id: CategoryId) -> DomainResult<Option<Category>> {
        Ok(self.state.categories.get(&id).cloned())
    }

    async fn find_category_by_name(&mut self, name: &str) -> DomainResult<Option<Category>> {
        Ok(self
            .state
            .categories
            .values()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn list_categories(&mut self) -> DomainResult<Vec<Category>> {
        let mut categories: Vec<Category> = self.state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }
}

#[async_trait]
impl ProductRepository for InMemoryTx {
    async fn insert_product(&mut self, product: &Product) -> DomainResult<()> {
        if self.state.products.values().any(|p| p.code == product.code) {
            return Err(duplicate("product code", &product.code));
        }
        self.state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> DomainResult<()> {
        if self
            .state
            .products
            .values()
            .any(|p| p.id != product.id && p.code == product.code)
        {
            return Err(duplicate("product code", &product.code));
        }
        replace(&mut self.state.products, product, "product")
    }

    async fn delete_product(&mut self, id: ProductId) -> DomainResult<bool> {
        Ok(self.state.products.remove(&id).is_some())
    }

    async fn find_product(&mut self, id: ProductId) -> DomainResult<Option<Product>> {
        Ok(self.state.products.get(&id).cloned())
    }

    async fn find_product_by_code(&mut self, code: &str) -> DomainResult<Option<Product>> {
        Ok(self
            .state
            .products
            .values()
            .find(|p| p.code == code)
            .cloned())
    }

    async fn search_products(
        &mut self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> DomainResult<Page<Product>> {
        let mut matches: Vec<Product> = self
            .state
            .products
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(Page::from_all(matches, pagination))
    }

    async fn count_products_in_category(&mut self, id: CategoryId) -> DomainResult<u64> {
        Ok(self
            .state
            .products
            .values()
            .filter(|p| p.category_id == id)
            .count() as u64)
    }

    async fn product_in_use(&mut self, id: ProductId) -> DomainResult<bool> {
        Ok(self.state.stock.iter().any(|t| t.product_id == id)
            || self.state.items.iter().any(|i| i.product_id == id))
    }
}

#[async_trait]
impl SupplierRepository for InMemoryTx {
    async fn insert_supplier(&mut self, supplier: &Supplier) -> DomainResult<()> {
        if self.state.suppliers.values().any(|s| s.email == supplier.email) {
            return Err(duplicate("supplier email", &supplier.email));
        }
        self.state.suppliers.insert(supplier.id, supplier.clone());
        Ok(())
    }

    async fn update_supplier(&mut self, supplier: &Supplier) -> DomainResult<()> {
        if self
            .state
            .suppliers
            .values()
            .any(|s| s.id != supplier.id && s.email == supplier.email)
        {
            return Err(duplicate("supplier email", &supplier.email));
        }
        replace(&mut self.state.suppliers, supplier, "supplier")
    }

    async fn delete_supplier(&mut self, id: SupplierId) -> DomainResult<bool> {
        Ok(self.state.suppliers.remove(&id).is_some())
    }

    async fn find_supplier(&mut self, id: SupplierId) -> DomainResult<Option<Supplier>> {
        Ok(self.state.suppliers.get(&id).cloned())
    }

    async fn find_supplier_by_email(&mut self, email: &str) -> DomainResult<Option<Supplier>> {
        Ok(self
            .state
            .suppliers
            .values()
            .find(|s| s.email == email)
            .cloned())
    }

    async fn search_suppliers(
        &mut self,
        filter: &SupplierFilter,
        pagination: Pagination,
    ) -> DomainResult<Page<Supplier>> {
        let mut matches: Vec<Supplier> = self
            .state
            .suppliers
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(Page::from_all(matches, pagination))
    }

    async fn supplier_in_use(&mut self, id: SupplierId) -> DomainResult<bool> {
        Ok(self.state.orders.values().any(|o| o.supplier_id == id))
    }
}

#[async_trait]
impl StockRepository for InMemoryTx {
    async fn append_transaction(&mut self, transaction: &StockTransaction) -> DomainResult<()> {
        self.faults.take_stock_append()?;
        if !self.state.products.contains_key(&transaction.product_id) {
            return Err(missing("product", transaction.product_id));
        }
        self.state.stock.push(transaction.clone());
        Ok(())
    }

    async fn stock_totals(&mut self, product_id: ProductId) -> DomainResult<StockTotals> {
        StockTotals::from_transactions(
            self.state.stock.iter().filter(|t| t.product_id == product_id),
        )
    }

    async fn stock_totals_by_product(&mut self) -> DomainResult<HashMap<ProductId, StockTotals>> {
        let mut totals: HashMap<ProductId, StockTotals> = HashMap::new();
        for t in &self.state.stock {
            totals
                .entry(t.product_id)
                .or_default()
                .record(t.kind, t.quantity)?;
        }
        Ok(totals)
    }

    async fn search_transactions(
        &mut self,
        filter: &StockMovementFilter,
        pagination: Pagination,
    ) -> DomainResult<Page<StockTransaction>> {
        // The log is kept in append order; newest first is its reverse.
        let matches: Vec<StockTransaction> = self
            .state
            .stock
            .iter()
            .rev()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        Ok(Page::from_all(matches, pagination))
    }

    async fn list_transactions(
        &mut self,
        filter: &StockMovementFilter,
    ) -> DomainResult<Vec<StockTransaction>> {
        Ok(self
            .state
            .stock
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PurchaseOrderRepository for InMemoryTx {
    async fn insert_order(&mut self, order: &PurchaseOrder) -> DomainResult<()> {
        if self.state.orders.contains_key(&order.id) {
            return Err(duplicate("purchase order", &order.id.to_string()));
        }
        self.state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_order(&mut self, order: &PurchaseOrder) -> DomainResult<()> {
        replace(&mut self.state.orders, order, "purchase order")
    }

    async fn find_order(&mut self, id: PurchaseOrderId) -> DomainResult<Option<PurchaseOrder>> {
        Ok(self.state.orders.get(&id).cloned())
    }

    // The store-wide guard already excludes every other unit of work.
    async fn find_order_for_update(
        &mut self,
        id: PurchaseOrderId,
    ) -> DomainResult<Option<PurchaseOrder>> {
        self.find_order(id).await
    }

    async fn search_orders(
        &mut self,
        filter: &PurchaseOrderFilter,
        pagination: Pagination,
    ) -> DomainResult<Page<PurchaseOrder>> {
        let mut matches: Vec<PurchaseOrder> = self
            .state
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(Page::from_all(matches, pagination))
    }

    async fn insert_item(&mut self, item: &PurchaseOrderItem) -> DomainResult<()> {
        if !self.state.orders.contains_key(&item.purchase_order_id) {
            return Err(missing("purchase order", item.purchase_order_id));
        }
        self.state.items.push(item.clone());
        Ok(())
    }

    async fn update_item(&mut self, item: &PurchaseOrderItem) -> DomainResult<()> {
        let slot = self
            .state
            .items
            .iter_mut()
            .find(|i| i.id == item.id)
            .ok_or_else(|| missing("purchase order item", item.id))?;
        *slot = item.clone();
        Ok(())
    }

    async fn delete_item(&mut self, id: PurchaseOrderItemId) -> DomainResult<bool> {
        let before = self.state.items.len();
        self.state.items.retain(|i| i.id != id);
        Ok(self.state.items.len() != before)
    }

    async fn find_item(
        &mut self,
        id: PurchaseOrderItemId,
    ) -> DomainResult<Option<PurchaseOrderItem>> {
        Ok(self.state.items.iter().find(|i| i.id == id).cloned())
    }

    async fn items_for_order(
        &mut self,
        order_id: PurchaseOrderId,
    ) -> DomainResult<Vec<PurchaseOrderItem>> {
        Ok(self
            .state
            .items
            .iter()
            .filter(|i| i.purchase_order_id == order_id)
            .cloned()
            .collect())
    }

    async fn delete_items_for_order(&mut self, order_id: PurchaseOrderId) -> DomainResult<u64> {
        let before = self.state.items.len();
        self.state.items.retain(|i| i.purchase_order_id != order_id);
        Ok((before - self.state.items.len()) as u64)
    }
}
