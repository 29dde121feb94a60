//! Suppliers (the parties purchase orders are placed with).

pub mod directory;
pub mod supplier;

pub use directory::SupplierDirectory;
pub use supplier::{Supplier, SupplierDraft, SupplierFilter, SupplierRepository};
