//! Stock ledger service and the posting primitives it is built from.
//!
//! `post_*` run inside a caller-supplied unit of work so other workflows
//! (purchase-order receiving) can post movements atomically with their own
//! writes. `StockLedger` wraps each posting in its own transaction.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tallyerp_core::{
    DomainError, DomainResult, Page, Pagination, ProductId, StockTransactionId, Store, UnitOfWork,
    UserId,
};
use tallyerp_products::ProductRepository;

use crate::repository::{StockMovementFilter, StockRepository};
use crate::transaction::{StockLevel, StockTransaction, TransactionType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordIn {
    pub product_id: ProductId,
    pub quantity: i64,
    pub reason: Option<String>,
    pub reference_id: Option<String>,
    pub created_by: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOut {
    pub product_id: ProductId,
    pub quantity: i64,
    pub reason: Option<String>,
    pub reference_id: Option<String>,
    pub created_by: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAdjust {
    pub product_id: ProductId,
    /// Signed delta; must be non-zero.
    pub quantity: i64,
    pub reason: String,
    pub created_by: UserId,
}

fn require_positive(quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::invalid_argument(format!(
            "quantity must be greater than zero, got {quantity}"
        )));
    }
    Ok(())
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn append<T>(
    tx: &mut T,
    product_id: ProductId,
    kind: TransactionType,
    quantity: i64,
    reason: Option<String>,
    reference_id: Option<String>,
    created_by: UserId,
) -> DomainResult<StockTransaction>
where
    T: StockRepository + ProductRepository + ?Sized,
{
    if tx.find_product(product_id).await?.is_none() {
        return Err(DomainError::not_found(format!("product {product_id}")));
    }

    // Refuse entries that would push the derived totals out of `i64` range.
    let mut totals = tx.stock_totals(product_id).await?;
    totals.record(kind, quantity)?;
    totals.current()?;

    let transaction = StockTransaction {
        id: StockTransactionId::new(),
        product_id,
        kind,
        quantity,
        reason,
        reference_id,
        created_by,
        created_at: Utc::now(),
    };
    tx.append_transaction(&transaction).await?;
    Ok(transaction)
}

/// Appends an IN movement within `tx`.
pub async fn post_in<T>(tx: &mut T, cmd: RecordIn) -> DomainResult<StockTransaction>
where
    T: StockRepository + ProductRepository + ?Sized,
{
    require_positive(cmd.quantity)?;
    append(
        tx,
        cmd.product_id,
        TransactionType::In,
        cmd.quantity,
        clean(cmd.reason),
        clean(cmd.reference_id),
        cmd.created_by,
    )
    .await
}

/// Appends an OUT movement within `tx`.
///
/// Available stock is not checked; the derived level may go negative.
pub async fn post_out<T>(tx: &mut T, cmd: RecordOut) -> DomainResult<StockTransaction>
where
    T: StockRepository + ProductRepository + ?Sized,
{
    require_positive(cmd.quantity)?;
    append(
        tx,
        cmd.product_id,
        TransactionType::Out,
        cmd.quantity,
        clean(cmd.reason),
        clean(cmd.reference_id),
        cmd.created_by,
    )
    .await
}

/// Appends an ADJUST movement within `tx`.
pub async fn post_adjust<T>(tx: &mut T, cmd: RecordAdjust) -> DomainResult<StockTransaction>
where
    T: StockRepository + ProductRepository + ?Sized,
{
    if cmd.quantity == 0 {
        return Err(DomainError::invalid_argument(
            "adjustment quantity cannot be zero",
        ));
    }
    let reason = tallyerp_core::error::require_non_blank("reason", &cmd.reason)?;
    append(
        tx,
        cmd.product_id,
        TransactionType::Adjust,
        cmd.quantity,
        Some(reason),
        None,
        cmd.created_by,
    )
    .await
}

pub struct StockLedger<S> {
    store: S,
}

impl<S> StockLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> StockLedger<S>
where
    S: Store,
    S::Tx: StockRepository + ProductRepository,
{
    #[instrument(skip(self, cmd), fields(product_id = %cmd.product_id, quantity = cmd.quantity))]
    pub async fn record_in(&self, cmd: RecordIn) -> DomainResult<StockTransaction> {
        let mut tx = self.store.begin().await?;
        let transaction = post_in(&mut tx, cmd).await?;
        tx.commit().await?;

        tracing::info!(transaction_id = %transaction.id, "stock received");
        Ok(transaction)
    }

    #[instrument(skip(self, cmd), fields(product_id = %cmd.product_id, quantity = cmd.quantity))]
    pub async fn record_out(&self, cmd: RecordOut) -> DomainResult<StockTransaction> {
        let mut tx = self.store.begin().await?;
        let transaction = post_out(&mut tx, cmd).await?;
        tx.commit().await?;

        tracing::info!(transaction_id = %transaction.id, "stock issued");
        Ok(transaction)
    }

    #[instrument(skip(self, cmd), fields(product_id = %cmd.product_id, quantity = cmd.quantity))]
    pub async fn record_adjust(&self, cmd: RecordAdjust) -> DomainResult<StockTransaction> {
        let mut tx = self.store.begin().await?;
        let transaction = post_adjust(&mut tx, cmd).await?;
        tx.commit().await?;

        tracing::info!(transaction_id = %transaction.id, "stock adjusted");
        Ok(transaction)
    }

    #[instrument(skip(self))]
    pub async fn current_stock(&self, product_id: ProductId) -> DomainResult<StockLevel> {
        let mut tx = self.store.begin().await?;
        if tx.find_product(product_id).await?.is_none() {
            tx.rollback().await?;
            return Err(DomainError::not_found(format!("product {product_id}")));
        }
        let totals = tx.stock_totals(product_id).await?;
        tx.rollback().await?;
        StockLevel::new(product_id, totals)
    }

    #[instrument(skip(self))]
    pub async fn movements(
        &self,
        filter: &StockMovementFilter,
        pagination: Pagination,
    ) -> DomainResult<Page<StockTransaction>> {
        let mut tx = self.store.begin().await?;
        let page = tx.search_transactions(filter, pagination).await?;
        tx.rollback().await?;
        Ok(page)
    }
}
