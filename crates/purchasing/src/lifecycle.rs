//! Purchase order workflow.
//!
//! Every operation runs in one unit of work. Item changes are only accepted
//! while the order is DRAFT and always rewrite `total_amount` from the
//! current item set before committing.

use chrono::Utc;
use tracing::instrument;

use tallyerp_core::{
    DomainError, DomainResult, Page, Pagination, ProductId, PurchaseOrderId, PurchaseOrderItemId,
    Store, SupplierId, UnitOfWork, UserId,
};
use tallyerp_inventory::{RecordIn, StockRepository, post_in};
use tallyerp_parties::SupplierRepository;
use tallyerp_products::ProductRepository;

use crate::order::{
    NewOrderLine, PurchaseOrder, PurchaseOrderDetail, PurchaseOrderItem, PurchaseOrderStatus,
    order_total, validate_quantity,
};
use crate::repository::{PurchaseOrderFilter, PurchaseOrderRepository};

/// Reason recorded on the IN movements created by receiving an order.
pub const RECEIPT_REASON: &str = "Purchase Order Received";

pub struct PurchaseOrderLifecycle<S> {
    store: S,
}

impl<S> PurchaseOrderLifecycle<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

fn clean_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

async fn load_order<T>(tx: &mut T, id: PurchaseOrderId) -> DomainResult<PurchaseOrder>
where
    T: PurchaseOrderRepository + ?Sized,
{
    tx.find_order(id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("purchase order {id}")))
}

/// Load an order and hold its row lock until the unit of work ends, so
/// concurrent status changes and item edits on the same order serialise.
async fn lock_order<T>(tx: &mut T, id: PurchaseOrderId) -> DomainResult<PurchaseOrder>
where
    T: PurchaseOrderRepository + ?Sized,
{
    tx.find_order_for_update(id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("purchase order {id}")))
}

/// Lock the parent order of `item_id`, then re-read the item under that lock.
async fn lock_item<T>(
    tx: &mut T,
    item_id: PurchaseOrderItemId,
) -> DomainResult<(PurchaseOrderItem, PurchaseOrder)>
where
    T: PurchaseOrderRepository + ?Sized,
{
    let missing = || DomainError::not_found(format!("purchase order item {item_id}"));
    let item = tx.find_item(item_id).await?.ok_or_else(missing)?;
    let order = lock_order(&mut *tx, item.purchase_order_id).await?;
    let item = tx.find_item(item_id).await?.ok_or_else(missing)?;
    Ok((item, order))
}

async fn ensure_supplier<T>(tx: &mut T, id: SupplierId) -> DomainResult<()>
where
    T: SupplierRepository + ?Sized,
{
    match tx.find_supplier(id).await? {
        Some(_) => Ok(()),
        None => Err(DomainError::not_found(format!("supplier {id}"))),
    }
}

/// Resolve each line's product and price into an item of `order_id`.
async fn build_items<T>(
    tx: &mut T,
    order_id: PurchaseOrderId,
    lines: Vec<NewOrderLine>,
) -> DomainResult<Vec<PurchaseOrderItem>>
where
    T: ProductRepository + ?Sized,
{
    for line in &lines {
        line.validate()?;
    }

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let product = tx
            .find_product(line.product_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("product {}", line.product_id)))?;
        items.push(PurchaseOrderItem {
            id: PurchaseOrderItemId::new(),
            purchase_order_id: order_id,
            product_id: product.id,
            quantity: line.quantity,
            unit_price: line.unit_price.unwrap_or(product.cost_price),
        });
    }
    Ok(items)
}

/// Recompute the order total from its stored items and persist it.
async fn refresh_total<T>(tx: &mut T, order: &mut PurchaseOrder) -> DomainResult<()>
where
    T: PurchaseOrderRepository + ?Sized,
{
    let items = tx.items_for_order(order.id).await?;
    order.total_amount = order_total(&items)?;
    order.updated_at = Utc::now();
    tx.update_order(order).await
}

impl<S> PurchaseOrderLifecycle<S>
where
    S: Store,
    S::Tx: PurchaseOrderRepository + SupplierRepository + ProductRepository + StockRepository,
{
    #[instrument(skip(self, lines, notes), fields(lines = lines.len()))]
    pub async fn create(
        &self,
        supplier_id: SupplierId,
        lines: Vec<NewOrderLine>,
        notes: Option<String>,
        created_by: UserId,
    ) -> DomainResult<PurchaseOrderDetail> {
        let mut tx = self.store.begin().await?;
        ensure_supplier(&mut tx, supplier_id).await?;

        let id = PurchaseOrderId::new();
        let items = build_items(&mut tx, id, lines).await?;
        let now = Utc::now();
        let order = PurchaseOrder {
            id,
            supplier_id,
            status: PurchaseOrderStatus::Draft,
            total_amount: order_total(&items)?,
            notes: clean_notes(notes),
            created_by,
            created_at: now,
            updated_at: now,
        };

        tx.insert_order(&order).await?;
        for item in &items {
            tx.insert_item(item).await?;
        }
        tx.commit().await?;

        tracing::info!(order_id = %order.id, total = order.total_amount, "purchase order created");
        Ok(PurchaseOrderDetail { order, items })
    }

    /// Replace supplier, notes and the whole item set of a DRAFT order.
    #[instrument(skip(self, lines, notes), fields(lines = lines.len()))]
    pub async fn update(
        &self,
        id: PurchaseOrderId,
        supplier_id: SupplierId,
        lines: Vec<NewOrderLine>,
        notes: Option<String>,
    ) -> DomainResult<PurchaseOrderDetail> {
        let mut tx = self.store.begin().await?;
        let mut order = lock_order(&mut tx, id).await?;
        order.ensure_draft()?;
        ensure_supplier(&mut tx, supplier_id).await?;

        let items = build_items(&mut tx, id, lines).await?;
        tx.delete_items_for_order(id).await?;
        for item in &items {
            tx.insert_item(item).await?;
        }

        order.supplier_id = supplier_id;
        order.notes = clean_notes(notes);
        refresh_total(&mut tx, &mut order).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, total = order.total_amount, "purchase order updated");
        Ok(PurchaseOrderDetail { order, items })
    }

    /// Add an item priced at the product's current cost price.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        order_id: PurchaseOrderId,
        product_id: ProductId,
        quantity: i64,
    ) -> DomainResult<PurchaseOrderItem> {
        validate_quantity(quantity)?;
        let mut tx = self.store.begin().await?;
        let mut order = lock_order(&mut tx, order_id).await?;
        order.ensure_draft()?;

        let mut items = build_items(
            &mut tx,
            order_id,
            vec![NewOrderLine {
                product_id,
                quantity,
                unit_price: None,
            }],
        )
        .await?;
        let item = items
            .pop()
            .ok_or_else(|| DomainError::internal("no item built for order line"))?;

        tx.insert_item(&item).await?;
        refresh_total(&mut tx, &mut order).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order_id, item_id = %item.id, "purchase order item added");
        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        item_id: PurchaseOrderItemId,
        quantity: i64,
    ) -> DomainResult<PurchaseOrderItem> {
        validate_quantity(quantity)?;
        let mut tx = self.store.begin().await?;
        let (mut item, mut order) = lock_item(&mut tx, item_id).await?;
        order.ensure_draft()?;

        item.quantity = quantity;
        tx.update_item(&item).await?;
        refresh_total(&mut tx, &mut order).await?;
        tx.commit().await?;

        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn delete_item(&self, item_id: PurchaseOrderItemId) -> DomainResult<()> {
        let mut tx = self.store.begin().await?;
        let (_, mut order) = lock_item(&mut tx, item_id).await?;
        order.ensure_draft()?;

        tx.delete_item(item_id).await?;
        refresh_total(&mut tx, &mut order).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, item_id = %item_id, "purchase order item deleted");
        Ok(())
    }

    /// Move an order to `status`.
    ///
    /// Receiving posts one IN movement per item, attributed to `changed_by`.
    /// A failure on any posting leaves both the status and the ledger
    /// untouched.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: PurchaseOrderId,
        status: PurchaseOrderStatus,
        changed_by: UserId,
    ) -> DomainResult<PurchaseOrder> {
        let mut tx = self.store.begin().await?;
        let mut order = lock_order(&mut tx, id).await?;
        if order.status.is_terminal() {
            return Err(DomainError::invalid_state(format!(
                "purchase order {id} is already {}",
                order.status
            )));
        }

        let previous = order.status;
        order.status = status;
        order.updated_at = Utc::now();
        tx.update_order(&order).await?;

        if status == PurchaseOrderStatus::Received {
            let items = tx.items_for_order(id).await?;
            for item in &items {
                post_in(
                    &mut tx,
                    RecordIn {
                        product_id: item.product_id,
                        quantity: item.quantity,
                        reason: Some(RECEIPT_REASON.to_string()),
                        reference_id: Some(id.to_string()),
                        created_by: changed_by,
                    },
                )
                .await?;
            }
            tracing::info!(order_id = %id, items = items.len(), "purchase order received into stock");
        }

        tx.commit().await?;

        tracing::info!(order_id = %id, from = %previous, to = %status, "purchase order status changed");
        Ok(order)
    }

    pub async fn get(&self, id: PurchaseOrderId) -> DomainResult<PurchaseOrderDetail> {
        let mut tx = self.store.begin().await?;
        let order = load_order(&mut tx, id).await?;
        let items = tx.items_for_order(id).await?;
        tx.rollback().await?;
        Ok(PurchaseOrderDetail { order, items })
    }

    pub async fn search(
        &self,
        filter: &PurchaseOrderFilter,
        pagination: Pagination,
    ) -> DomainResult<Page<PurchaseOrder>> {
        let mut tx = self.store.begin().await?;
        let page = tx.search_orders(filter, pagination).await?;
        tx.rollback().await?;
        Ok(page)
    }
}
