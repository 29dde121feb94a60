//! `tallyerp-core`: shared domain building blocks.
//!
//! Identifiers, the domain error taxonomy, pagination, and the unit-of-work
//! port that every persistence backend implements. No IO lives here.

pub mod entity;
pub mod error;
pub mod id;
pub mod page;
pub mod store;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    CategoryId, ProductId, PurchaseOrderId, PurchaseOrderItemId, StockTransactionId, SupplierId,
    UserId,
};
pub use page::{Page, Pagination};
pub use store::{Store, UnitOfWork};
