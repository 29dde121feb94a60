use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tallyerp_core::{DomainResult, Page, Pagination, ProductId};

use crate::transaction::{StockTotals, StockTransaction, TransactionType};

/// Typed stock movement query. `from`/`to` are inclusive bounds on `created_at`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockMovementFilter {
    pub product_id: Option<ProductId>,
    pub kind: Option<TransactionType>,
    pub reference_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl StockMovementFilter {
    pub fn for_product(product_id: ProductId) -> Self {
        Self {
            product_id: Some(product_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, t: &StockTransaction) -> bool {
        if self.product_id.is_some_and(|p| p != t.product_id) {
            return false;
        }
        if self.kind.is_some_and(|k| k != t.kind) {
            return false;
        }
        if let Some(reference) = &self.reference_id {
            if t.reference_id.as_deref() != Some(reference.as_str()) {
                return false;
            }
        }
        if self.from.is_some_and(|from| t.created_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| t.created_at > to) {
            return false;
        }
        true
    }
}

/// Append-only persistence port for the stock ledger.
///
/// Entries are never updated or deleted.
#[async_trait]
pub trait StockRepository: Send {
    async fn append_transaction(&mut self, transaction: &StockTransaction) -> DomainResult<()>;

    async fn stock_totals(&mut self, product_id: ProductId) -> DomainResult<StockTotals>;

    /// Totals for every product that has at least one transaction.
    async fn stock_totals_by_product(&mut self) -> DomainResult<HashMap<ProductId, StockTotals>>;

    /// Matching movements, newest first.
    async fn search_transactions(
        &mut self,
        filter: &StockMovementFilter,
        pagination: Pagination,
    ) -> DomainResult<Page<StockTransaction>>;

    /// Every matching movement in chronological order.
    async fn list_transactions(
        &mut self,
        filter: &StockMovementFilter,
    ) -> DomainResult<Vec<StockTransaction>>;
}
