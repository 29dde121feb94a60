//! Product catalog: categories and products.
//!
//! Entities and validation rules are plain data; `Catalog` runs each
//! operation inside one unit of work against the repository ports declared in
//! `repository`.

pub mod catalog;
pub mod category;
pub mod product;
pub mod repository;

pub use catalog::Catalog;
pub use category::{Category, CategoryDraft};
pub use product::{DEFAULT_UNIT, Product, ProductDraft};
pub use repository::{CategoryRepository, ProductFilter, ProductRepository};
