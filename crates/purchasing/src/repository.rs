use async_trait::async_trait;

use tallyerp_core::{
    DomainResult, Page, Pagination, PurchaseOrderId, PurchaseOrderItemId, SupplierId,
};

use crate::order::{PurchaseOrder, PurchaseOrderItem, PurchaseOrderStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurchaseOrderFilter {
    pub supplier_id: Option<SupplierId>,
    pub status: Option<PurchaseOrderStatus>,
}

impl PurchaseOrderFilter {
    pub fn matches(&self, order: &PurchaseOrder) -> bool {
        self.supplier_id.is_none_or(|s| s == order.supplier_id)
            && self.status.is_none_or(|s| s == order.status)
    }
}

#[async_trait]
pub trait PurchaseOrderRepository: Send {
    async fn insert_order(&mut self, order: &PurchaseOrder) -> DomainResult<()>;

    async fn update_order(&mut self, order: &PurchaseOrder) -> DomainResult<()>;

    async fn find_order(&mut self, id: PurchaseOrderId) -> DomainResult<Option<PurchaseOrder>>;

    /// Like `find_order`, but holds a write lock on the order until the unit
    /// of work commits or rolls back.
    async fn find_order_for_update(
        &mut self,
        id: PurchaseOrderId,
    ) -> DomainResult<Option<PurchaseOrder>>;

    /// Matching orders, newest first.
    async fn search_orders(
        &mut self,
        filter: &PurchaseOrderFilter,
        pagination: Pagination,
    ) -> DomainResult<Page<PurchaseOrder>>;

    async fn insert_item(&mut self, item: &PurchaseOrderItem) -> DomainResult<()>;

    async fn update_item(&mut self, item: &PurchaseOrderItem) -> DomainResult<()>;

    /// Returns `false` when no row was deleted.
    async fn delete_item(&mut self, id: PurchaseOrderItemId) -> DomainResult<bool>;

    async fn find_item(
        &mut self,
        id: PurchaseOrderItemId,
    ) -> DomainResult<Option<PurchaseOrderItem>>;

    /// Items of one order in insertion order.
    async fn items_for_order(
        &mut self,
        order_id: PurchaseOrderId,
    ) -> DomainResult<Vec<PurchaseOrderItem>>;

    /// Returns the number of items removed.
    async fn delete_items_for_order(&mut self, order_id: PurchaseOrderId) -> DomainResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tallyerp_core::UserId;

    fn order(supplier_id: SupplierId, status: PurchaseOrderStatus) -> PurchaseOrder {
        PurchaseOrder {
            id: PurchaseOrderId::new(),
            supplier_id,
            status,
            total_amount: 0,
            notes: None,
            created_by: UserId::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn filter_by_supplier_and_status() {
        let supplier = SupplierId::new();
        let o = order(supplier, PurchaseOrderStatus::Draft);

        assert!(PurchaseOrderFilter::default().matches(&o));
        assert!(
            PurchaseOrderFilter {
                supplier_id: Some(supplier),
                status: Some(PurchaseOrderStatus::Draft),
            }
            .matches(&o)
        );
        assert!(
            !PurchaseOrderFilter {
                supplier_id: Some(SupplierId::new()),
                status: None,
            }
            .matches(&o)
        );
        assert!(
            !PurchaseOrderFilter {
                supplier_id: None,
                status: Some(PurchaseOrderStatus::Received),
            }
            .matches(&o)
        );
    }
}
