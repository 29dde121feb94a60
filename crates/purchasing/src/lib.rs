//! Purchasing: purchase orders and their DRAFT → RECEIVED lifecycle.
//!
//! Receiving an order posts one IN movement per item to the stock ledger,
//! inside the same unit of work as the status change.

pub mod lifecycle;
pub mod order;
pub mod repository;

pub use lifecycle::{PurchaseOrderLifecycle, RECEIPT_REASON};
pub use order::{
    NewOrderLine, PurchaseOrder, PurchaseOrderDetail, PurchaseOrderItem, PurchaseOrderStatus,
    order_total,
};
pub use repository::{PurchaseOrderFilter, PurchaseOrderRepository};
