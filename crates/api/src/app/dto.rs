//! Request DTOs and mapping into domain inputs.
//!
//! Ids arrive as strings so a malformed id is reported as `invalid_id`
//! instead of a generic body rejection.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use tallyerp_core::{CategoryId, Pagination, ProductId, SupplierId};
use tallyerp_inventory::{StockMovementFilter, StockSummaryFilter, TransactionType};
use tallyerp_parties::{SupplierDraft, SupplierFilter};
use tallyerp_products::{CategoryDraft, ProductDraft, ProductFilter};
use tallyerp_purchasing::{NewOrderLine, PurchaseOrderFilter, PurchaseOrderStatus};

use crate::app::errors::ApiError;

pub fn parse_id<T: FromStr>(what: &str, raw: &str) -> Result<T, ApiError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ApiError::invalid_id(what, raw))
}

fn parse_opt_id<T: FromStr>(what: &str, raw: Option<&str>) -> Result<Option<T>, ApiError> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => parse_id(what, raw).map(Some),
        None => Ok(None),
    }
}

fn parse_opt<T>(raw: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: FromStr<Err = tallyerp_core::DomainError>,
{
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => Ok(Some(raw.parse::<T>()?)),
        None => Ok(None),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

// -------------------------
// Catalog
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<CategoryRequest> for CategoryDraft {
    fn from(body: CategoryRequest) -> Self {
        CategoryDraft {
            name: body.name,
            description: body.description,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub code: String,
    pub name: String,
    pub category_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    pub cost_price: i64,
    pub selling_price: i64,
    #[serde(default)]
    pub min_stock: i64,
}

impl ProductRequest {
    pub fn into_draft(self) -> Result<ProductDraft, ApiError> {
        Ok(ProductDraft {
            category_id: parse_id::<CategoryId>("category", &self.category_id)?,
            code: self.code,
            name: self.name,
            description: self.description,
            unit: self.unit,
            cost_price: self.cost_price,
            selling_price: self.selling_price,
            min_stock: self.min_stock,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub q: Option<String>,
    pub category_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ProductQuery {
    pub fn filter(&self) -> Result<ProductFilter, ApiError> {
        Ok(ProductFilter {
            category_id: parse_opt_id::<CategoryId>("category", self.category_id.as_deref())?,
            text: self.q.clone(),
        })
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

// -------------------------
// Suppliers
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SupplierRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl From<SupplierRequest> for SupplierDraft {
    fn from(body: SupplierRequest) -> Self {
        SupplierDraft {
            name: body.name,
            email: body.email,
            phone: body.phone,
            address: body.address,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SupplierQuery {
    pub q: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl SupplierQuery {
    pub fn filter(&self) -> SupplierFilter {
        SupplierFilter {
            text: self.q.clone(),
        }
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

// -------------------------
// Stock
// -------------------------

#[derive(Debug, Deserialize)]
pub struct StockMovementRequest {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub reference_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StockAdjustRequest {
    pub product_id: String,
    pub quantity: i64,
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementQuery {
    pub product_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub reference_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl MovementQuery {
    pub fn filter(&self) -> Result<StockMovementFilter, ApiError> {
        Ok(StockMovementFilter {
            product_id: parse_opt_id::<ProductId>("product", self.product_id.as_deref())?,
            kind: parse_opt::<TransactionType>(self.kind.as_deref())?,
            reference_id: self
                .reference_id
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string),
            from: self.from,
            to: self.to,
        })
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StockSummaryQuery {
    pub category_id: Option<String>,
    #[serde(default)]
    pub low_stock_only: bool,
}

impl StockSummaryQuery {
    pub fn filter(&self) -> Result<StockSummaryFilter, ApiError> {
        Ok(StockSummaryFilter {
            category_id: parse_opt_id::<CategoryId>("category", self.category_id.as_deref())?,
            low_stock_only: self.low_stock_only,
        })
    }
}

// -------------------------
// Purchasing
// -------------------------

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: Option<i64>,
}

impl OrderLineRequest {
    pub fn into_line(self) -> Result<NewOrderLine, ApiError> {
        Ok(NewOrderLine {
            product_id: parse_id::<ProductId>("product", &self.product_id)?,
            quantity: self.quantity,
            unit_price: self.unit_price,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PurchaseOrderRequest {
    pub supplier_id: String,
    #[serde(default)]
    pub items: Vec<OrderLineRequest>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PurchaseOrderRequest {
    pub fn into_parts(self) -> Result<(SupplierId, Vec<NewOrderLine>, Option<String>), ApiError> {
        let supplier_id = parse_id::<SupplierId>("supplier", &self.supplier_id)?;
        let lines = self
            .items
            .into_iter()
            .map(OrderLineRequest::into_line)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((supplier_id, lines, self.notes))
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

impl StatusRequest {
    pub fn status(&self) -> Result<PurchaseOrderStatus, ApiError> {
        Ok(self.status.parse::<PurchaseOrderStatus>()?)
    }
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub supplier_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl OrderQuery {
    pub fn filter(&self) -> Result<PurchaseOrderFilter, ApiError> {
        Ok(PurchaseOrderFilter {
            supplier_id: parse_opt_id::<SupplierId>("supplier", self.supplier_id.as_deref())?,
            status: parse_opt::<PurchaseOrderStatus>(self.status.as_deref())?,
        })
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_ids_are_reported_as_invalid_id() {
        let err = parse_id::<ProductId>("product", "42").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);

        let query = ProductQuery {
            category_id: Some("nope".to_string()),
            ..ProductQuery::default()
        };
        assert!(query.filter().is_err());
    }

    #[test]
    fn blank_optional_filters_are_ignored() {
        let query = MovementQuery {
            product_id: Some("  ".to_string()),
            kind: Some(String::new()),
            reference_id: Some(" ".to_string()),
            ..MovementQuery::default()
        };
        assert_eq!(query.filter().unwrap(), StockMovementFilter::default());
    }

    #[test]
    fn unknown_enum_values_are_invalid_arguments() {
        let query = OrderQuery {
            status: Some("shipped".to_string()),
            ..OrderQuery::default()
        };
        assert_eq!(
            query.filter().unwrap_err().status(),
            axum::http::StatusCode::BAD_REQUEST
        );
    }
}
