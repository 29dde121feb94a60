//! Report rows for stock summaries and movement history.
//!
//! Rows are plain serialisable records; rendering them to a file format is
//! left to the caller.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tallyerp_core::{
    CategoryId, DomainResult, Pagination, ProductId, StockTransactionId, Store, UnitOfWork, UserId,
};
use tallyerp_products::{CategoryRepository, Product, ProductFilter, ProductRepository};

use crate::repository::{StockMovementFilter, StockRepository};
use crate::transaction::{StockTotals, TransactionType};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummaryFilter {
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub low_stock_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummaryRow {
    pub product_id: ProductId,
    pub code: String,
    pub name: String,
    pub category_id: CategoryId,
    pub category_name: Option<String>,
    pub unit: String,
    pub min_stock: i64,
    pub total_in: i64,
    pub total_out: i64,
    pub total_adjust: i64,
    pub current_stock: i64,
    pub low_stock: bool,
}

impl StockSummaryRow {
    fn new(
        product: Product,
        category_name: Option<String>,
        totals: StockTotals,
    ) -> DomainResult<Self> {
        let current_stock = totals.current()?;
        Ok(Self {
            product_id: product.id,
            code: product.code,
            name: product.name,
            category_id: product.category_id,
            category_name,
            unit: product.unit,
            min_stock: product.min_stock,
            total_in: totals.total_in,
            total_out: totals.total_out,
            total_adjust: totals.total_adjust,
            current_stock,
            low_stock: current_stock < product.min_stock,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovementRow {
    pub transaction_id: StockTransactionId,
    pub created_at: DateTime<Utc>,
    pub product_id: ProductId,
    pub product_code: String,
    pub product_name: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub quantity: i64,
    pub reason: Option<String>,
    pub reference_id: Option<String>,
    pub created_by: UserId,
}

pub struct StockReports<S> {
    store: S,
}

impl<S> StockReports<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

/// Page through every product matching `filter`, ordered by code.
async fn all_products<T>(tx: &mut T, filter: &ProductFilter) -> DomainResult<Vec<Product>>
where
    T: ProductRepository + ?Sized,
{
    let mut products = Vec::new();
    let mut offset = 0u32;
    loop {
        let page = tx
            .search_products(filter, Pagination::new(Some(Pagination::MAX_LIMIT), Some(offset)))
            .await?;
        let fetched = page.items.len() as u32;
        products.extend(page.items);
        if !page.has_more || fetched == 0 {
            return Ok(products);
        }
        offset += fetched;
    }
}

impl<S> StockReports<S>
where
    S: Store,
    S::Tx: StockRepository + ProductRepository + CategoryRepository,
{
    /// One row per product, ordered by product code.
    #[instrument(skip(self))]
    pub async fn stock_summary(
        &self,
        filter: &StockSummaryFilter,
    ) -> DomainResult<Vec<StockSummaryRow>> {
        let mut tx = self.store.begin().await?;

        let categories: HashMap<CategoryId, String> = tx
            .list_categories()
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        let products = all_products(
            &mut tx,
            &ProductFilter {
                category_id: filter.category_id,
                text: None,
            },
        )
        .await?;
        let totals = tx.stock_totals_by_product().await?;
        tx.rollback().await?;

        let mut rows = Vec::with_capacity(products.len());
        for product in products {
            let product_totals = totals.get(&product.id).copied().unwrap_or_default();
            let category_name = categories.get(&product.category_id).cloned();
            let row = StockSummaryRow::new(product, category_name, product_totals)?;
            if !filter.low_stock_only || row.low_stock {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Matching movements in chronological order, joined with product code and name.
    #[instrument(skip(self))]
    pub async fn movement_report(
        &self,
        filter: &StockMovementFilter,
    ) -> DomainResult<Vec<StockMovementRow>> {
        let mut tx = self.store.begin().await?;
        let transactions = tx.list_transactions(filter).await?;

        let mut products: HashMap<ProductId, Option<Product>> = HashMap::new();
        for t in &transactions {
            if !products.contains_key(&t.product_id) {
                let product = tx.find_product(t.product_id).await?;
                products.insert(t.product_id, product);
            }
        }
        tx.rollback().await?;

        let rows = transactions
            .into_iter()
            .map(|t| {
                let (product_code, product_name) = match products.get(&t.product_id) {
                    Some(Some(p)) => (p.code.clone(), p.name.clone()),
                    _ => (String::new(), String::new()),
                };
                StockMovementRow {
                    transaction_id: t.id,
                    created_at: t.created_at,
                    product_id: t.product_id,
                    product_code,
                    product_name,
                    kind: t.kind,
                    quantity: t.quantity,
                    reason: t.reason,
                    reference_id: t.reference_id,
                    created_by: t.created_by,
                }
            })
            .collect();
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(min_stock: i64) -> Product {
        Product {
            id: ProductId::new(),
            code: "P-1".to_string(),
            name: "Widget".to_string(),
            category_id: CategoryId::new(),
            description: None,
            unit: "pcs".to_string(),
            cost_price: 10,
            selling_price: 15,
            min_stock,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn summary_row_flags_low_stock_below_threshold() {
        let totals = StockTotals {
            total_in: 10,
            total_out: 4,
            total_adjust: -1,
        };
        let row = StockSummaryRow::new(product(6), Some("Hardware".to_string()), totals).unwrap();
        assert_eq!(row.current_stock, 5);
        assert!(row.low_stock);

        let at_threshold = StockSummaryRow::new(product(5), None, totals).unwrap();
        assert!(!at_threshold.low_stock);
    }

    #[test]
    fn product_without_movements_has_zero_stock() {
        let row = StockSummaryRow::new(product(0), None, StockTotals::default()).unwrap();
        assert_eq!(row.current_stock, 0);
        assert!(!row.low_stock);
    }
}
